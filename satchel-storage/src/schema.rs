//! SQLite schema: one table per entity, with the two indexes the
//! list and change-generation paths depend on.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_key   TEXT NOT NULL UNIQUE,
    created_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS baskets (
    basket_id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id                     INTEGER NOT NULL REFERENCES users(user_id),
    name                        TEXT NOT NULL,
    number_of_desired_utxos     INTEGER NOT NULL DEFAULT 32,
    minimum_desired_utxo_value  INTEGER NOT NULL DEFAULT 1000,
    UNIQUE (user_id, name)
);

CREATE TABLE IF NOT EXISTS tx_labels (
    label_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL REFERENCES users(user_id),
    label      TEXT NOT NULL,
    UNIQUE (user_id, label)
);

CREATE TABLE IF NOT EXISTS output_tags (
    tag_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL REFERENCES users(user_id),
    tag        TEXT NOT NULL,
    UNIQUE (user_id, tag)
);

CREATE TABLE IF NOT EXISTS actions (
    action_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER NOT NULL REFERENCES users(user_id),
    txid         TEXT,
    raw_tx       BLOB,
    input_beef   BLOB,
    status       TEXT NOT NULL,
    satoshis     INTEGER NOT NULL DEFAULT 0,
    description  TEXT NOT NULL,
    version      INTEGER NOT NULL DEFAULT 1,
    lock_time    INTEGER NOT NULL DEFAULT 0,
    is_outgoing  INTEGER NOT NULL DEFAULT 1,
    reference    TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    UNIQUE (user_id, reference)
);

CREATE INDEX IF NOT EXISTS idx_actions_user_status
    ON actions (user_id, status);

CREATE TABLE IF NOT EXISTS action_labels (
    action_id  INTEGER NOT NULL REFERENCES actions(action_id) ON DELETE CASCADE,
    label_id   INTEGER NOT NULL REFERENCES tx_labels(label_id),
    PRIMARY KEY (action_id, label_id)
);

CREATE TABLE IF NOT EXISTS outputs (
    output_id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id              INTEGER NOT NULL REFERENCES users(user_id),
    action_id            INTEGER NOT NULL REFERENCES actions(action_id),
    vout                 INTEGER NOT NULL,
    satoshis             INTEGER NOT NULL,
    locking_script       TEXT,
    spendable            INTEGER NOT NULL DEFAULT 0,
    change               INTEGER NOT NULL DEFAULT 0,
    basket_id            INTEGER REFERENCES baskets(basket_id),
    spent_by_action_id   INTEGER REFERENCES actions(action_id),
    reserved_by          TEXT,
    output_type          TEXT NOT NULL DEFAULT 'P2PKH',
    purpose              TEXT NOT NULL DEFAULT '',
    custom_instructions  TEXT,
    derivation_prefix    TEXT,
    derivation_suffix    TEXT,
    sender_identity_key  TEXT,
    created_at           TEXT NOT NULL,
    UNIQUE (action_id, vout)
);

CREATE INDEX IF NOT EXISTS idx_outputs_user_spendable_satoshis
    ON outputs (user_id, spendable, satoshis);

CREATE TABLE IF NOT EXISTS output_tag_map (
    output_id  INTEGER NOT NULL REFERENCES outputs(output_id) ON DELETE CASCADE,
    tag_id     INTEGER NOT NULL REFERENCES output_tags(tag_id),
    PRIMARY KEY (output_id, tag_id)
);

CREATE TABLE IF NOT EXISTS commissions (
    commission_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        INTEGER NOT NULL REFERENCES users(user_id),
    action_id      INTEGER NOT NULL REFERENCES actions(action_id),
    satoshis       INTEGER NOT NULL,
    locking_script TEXT NOT NULL,
    is_redeemed    INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS proven_txs (
    proven_tx_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    txid          TEXT NOT NULL UNIQUE,
    block_height  INTEGER NOT NULL,
    merkle_path   BLOB NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS proven_tx_reqs (
    req_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      INTEGER NOT NULL REFERENCES users(user_id),
    action_id    INTEGER NOT NULL REFERENCES actions(action_id),
    txid         TEXT NOT NULL,
    raw_tx       BLOB NOT NULL,
    status       TEXT NOT NULL,
    attempts     INTEGER NOT NULL DEFAULT 0,
    last_status  TEXT,
    last_error   TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reqs_status
    ON proven_tx_reqs (status);

CREATE TABLE IF NOT EXISTS certificates (
    certificate_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id              INTEGER NOT NULL REFERENCES users(user_id),
    certificate_type     TEXT NOT NULL,
    serial_number        TEXT NOT NULL,
    subject              TEXT NOT NULL,
    certifier            TEXT NOT NULL,
    revocation_outpoint  TEXT,
    signature            TEXT,
    fields               TEXT NOT NULL DEFAULT '{}',
    UNIQUE (user_id, certificate_type, serial_number, certifier)
);
"#;
