//! SQLite-backed storage provider.
//!
//! One connection behind a mutex; every public operation runs inside
//! its own transaction, and the methods layer composes multi-step
//! operations through [`StorageProvider::with_tx`]. Row-level
//! functions take `&Connection` so they work both standalone and
//! inside an ambient transaction (a `Transaction` derefs to
//! `Connection`).

use crate::entities::*;
use crate::schema::SCHEMA;
use crate::StorageError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use satchel_codec::envelope::ActionStatus;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

pub struct StorageProvider {
    conn: Mutex<Connection>,
}

impl StorageProvider {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` inside a transaction; commit on `Ok`, roll back on
    /// `Err`. A partial failure leaves no observable state change.
    pub fn with_tx<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self.conn.lock().expect("storage mutex poisoned");
        let tx = guard.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                // Drop rolls the transaction back.
                Err(err)
            }
        }
    }

    // -- users ---------------------------------------------------------

    pub fn find_user_by_identity_key(
        &self,
        identity_key: &str,
    ) -> Result<Option<User>, StorageError> {
        self.with_tx(|c| rows::find_user_by_identity_key(c, identity_key))
    }

    /// Resolve the user for an identity key, creating the user row
    /// together with the default basket and label on first use.
    pub fn find_or_create_user(&self, identity_key: &str) -> Result<User, StorageError> {
        self.with_tx(|c| {
            if let Some(user) = rows::find_user_by_identity_key(c, identity_key)? {
                return Ok(user);
            }
            let user = rows::insert_user(c, identity_key)?;
            rows::insert_basket(
                c,
                user.user_id,
                DEFAULT_BASKET_NAME,
                DEFAULT_DESIRED_UTXOS,
                DEFAULT_MIN_UTXO_VALUE,
            )?;
            rows::find_or_create_label(c, user.user_id, DEFAULT_LABEL)?;
            debug!(user.user_id, "created user with default basket and label");
            Ok(user)
        })
    }

    // -- baskets and labels -------------------------------------------

    pub fn find_output_baskets(&self, user_id: i64) -> Result<Vec<Basket>, StorageError> {
        self.with_tx(|c| rows::find_output_baskets(c, user_id))
    }

    pub fn find_or_create_basket(&self, user_id: i64, name: &str) -> Result<Basket, StorageError> {
        self.with_tx(|c| rows::find_or_create_basket(c, user_id, name))
    }

    pub fn find_tx_labels(&self, user_id: i64) -> Result<Vec<TxLabel>, StorageError> {
        self.with_tx(|c| rows::find_tx_labels(c, user_id))
    }

    // -- reservations --------------------------------------------------

    /// Atomically claim `output_ids` for `reserved_by`. Fails without
    /// side effects when any output is already reserved by another
    /// in-flight action; this is the serialization point for
    /// concurrent action construction.
    pub fn reserve_outputs(
        &self,
        user_id: i64,
        output_ids: &[i64],
        reserved_by: &str,
    ) -> Result<(), StorageError> {
        self.with_tx(|c| rows::reserve_outputs(c, user_id, output_ids, reserved_by))
    }

    /// Idempotent release of every output held under `reserved_by`.
    pub fn release_outputs(&self, reserved_by: &str) -> Result<(), StorageError> {
        self.with_tx(|c| rows::release_outputs(c, reserved_by))
    }

    // -- actions -------------------------------------------------------

    pub fn find_action_by_reference(
        &self,
        user_id: i64,
        reference: &str,
    ) -> Result<Option<ActionRecord>, StorageError> {
        self.with_tx(|c| rows::find_action_by_reference(c, user_id, reference))
    }

    pub fn update_action_status(
        &self,
        action_id: i64,
        status: ActionStatus,
    ) -> Result<(), StorageError> {
        self.with_tx(|c| rows::update_action_status(c, action_id, status))
    }

    // -- proven txs ----------------------------------------------------

    pub fn insert_proven_tx(
        &self,
        txid: &str,
        block_height: u32,
        merkle_path: &[u8],
    ) -> Result<(), StorageError> {
        self.with_tx(|c| rows::insert_proven_tx(c, txid, block_height, merkle_path))
    }

    pub fn find_proven_tx(&self, txid: &str) -> Result<Option<ProvenTx>, StorageError> {
        self.with_tx(|c| rows::find_proven_tx(c, txid))
    }

    // -- misc ----------------------------------------------------------

    /// Spendable satoshis in a basket; the demo-facing balance.
    pub fn balance(&self, user_id: i64, basket: &str) -> Result<i64, StorageError> {
        self.with_tx(|c| {
            let basket = rows::find_basket(c, user_id, basket)?
                .ok_or(StorageError::NotFound("basket"))?;
            let sum: i64 = c.query_row(
                "SELECT COALESCE(SUM(satoshis), 0) FROM outputs
                 WHERE user_id = ?1 AND basket_id = ?2 AND spendable = 1",
                params![user_id, basket.basket_id],
                |row| row.get(0),
            )?;
            Ok(sum)
        })
    }
}

/// Row-level operations on an ambient connection/transaction.
pub mod rows {
    use super::*;

    fn now() -> String {
        Utc::now().to_rfc3339()
    }

    fn parse_time(s: String) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn status_of(s: String) -> ActionStatus {
        ActionStatus::from_str(&s).unwrap_or(ActionStatus::Failed)
    }

    // -- users --------------------------------------------------------

    fn user_from_row(row: &Row) -> rusqlite::Result<User> {
        Ok(User {
            user_id: row.get(0)?,
            identity_key: row.get(1)?,
            created_at: parse_time(row.get(2)?),
        })
    }

    pub fn find_user_by_identity_key(
        c: &Connection,
        identity_key: &str,
    ) -> Result<Option<User>, StorageError> {
        Ok(c.query_row(
            "SELECT user_id, identity_key, created_at FROM users WHERE identity_key = ?1",
            params![identity_key],
            user_from_row,
        )
        .optional()?)
    }

    pub fn insert_user(c: &Connection, identity_key: &str) -> Result<User, StorageError> {
        c.execute(
            "INSERT INTO users (identity_key, created_at) VALUES (?1, ?2)",
            params![identity_key, now()],
        )?;
        find_user_by_identity_key(c, identity_key)?.ok_or(StorageError::NotFound("user"))
    }

    // -- baskets ------------------------------------------------------

    fn basket_from_row(row: &Row) -> rusqlite::Result<Basket> {
        Ok(Basket {
            basket_id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            number_of_desired_utxos: row.get(3)?,
            minimum_desired_utxo_value: row.get(4)?,
        })
    }

    const BASKET_COLS: &str =
        "basket_id, user_id, name, number_of_desired_utxos, minimum_desired_utxo_value";

    pub fn find_basket(
        c: &Connection,
        user_id: i64,
        name: &str,
    ) -> Result<Option<Basket>, StorageError> {
        Ok(c.query_row(
            &format!("SELECT {BASKET_COLS} FROM baskets WHERE user_id = ?1 AND name = ?2"),
            params![user_id, name],
            basket_from_row,
        )
        .optional()?)
    }

    pub fn insert_basket(
        c: &Connection,
        user_id: i64,
        name: &str,
        desired_utxos: i64,
        min_value: i64,
    ) -> Result<Basket, StorageError> {
        c.execute(
            "INSERT INTO baskets (user_id, name, number_of_desired_utxos, minimum_desired_utxo_value)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, name, desired_utxos, min_value],
        )?;
        find_basket(c, user_id, name)?.ok_or(StorageError::NotFound("basket"))
    }

    pub fn find_or_create_basket(
        c: &Connection,
        user_id: i64,
        name: &str,
    ) -> Result<Basket, StorageError> {
        if let Some(basket) = find_basket(c, user_id, name)? {
            return Ok(basket);
        }
        insert_basket(c, user_id, name, DEFAULT_DESIRED_UTXOS, DEFAULT_MIN_UTXO_VALUE)
    }

    pub fn find_output_baskets(c: &Connection, user_id: i64) -> Result<Vec<Basket>, StorageError> {
        let mut stmt = c.prepare(&format!(
            "SELECT {BASKET_COLS} FROM baskets WHERE user_id = ?1 ORDER BY basket_id"
        ))?;
        let baskets = stmt
            .query_map(params![user_id], basket_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(baskets)
    }

    // -- labels and tags ----------------------------------------------

    pub fn find_or_create_label(
        c: &Connection,
        user_id: i64,
        label: &str,
    ) -> Result<i64, StorageError> {
        c.execute(
            "INSERT OR IGNORE INTO tx_labels (user_id, label) VALUES (?1, ?2)",
            params![user_id, label],
        )?;
        Ok(c.query_row(
            "SELECT label_id FROM tx_labels WHERE user_id = ?1 AND label = ?2",
            params![user_id, label],
            |row| row.get(0),
        )?)
    }

    pub fn find_tx_labels(c: &Connection, user_id: i64) -> Result<Vec<TxLabel>, StorageError> {
        let mut stmt = c.prepare(
            "SELECT label_id, user_id, label FROM tx_labels WHERE user_id = ?1 ORDER BY label_id",
        )?;
        let labels = stmt
            .query_map(params![user_id], |row| {
                Ok(TxLabel {
                    label_id: row.get(0)?,
                    user_id: row.get(1)?,
                    label: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(labels)
    }

    pub fn label_action(c: &Connection, action_id: i64, label_id: i64) -> Result<(), StorageError> {
        c.execute(
            "INSERT OR IGNORE INTO action_labels (action_id, label_id) VALUES (?1, ?2)",
            params![action_id, label_id],
        )?;
        Ok(())
    }

    pub fn labels_for_action(c: &Connection, action_id: i64) -> Result<Vec<String>, StorageError> {
        let mut stmt = c.prepare(
            "SELECT l.label FROM tx_labels l
             JOIN action_labels al ON al.label_id = l.label_id
             WHERE al.action_id = ?1 ORDER BY l.label",
        )?;
        let labels = stmt
            .query_map(params![action_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(labels)
    }

    pub fn find_or_create_tag(c: &Connection, user_id: i64, tag: &str) -> Result<i64, StorageError> {
        c.execute(
            "INSERT OR IGNORE INTO output_tags (user_id, tag) VALUES (?1, ?2)",
            params![user_id, tag],
        )?;
        Ok(c.query_row(
            "SELECT tag_id FROM output_tags WHERE user_id = ?1 AND tag = ?2",
            params![user_id, tag],
            |row| row.get(0),
        )?)
    }

    pub fn tag_output(c: &Connection, output_id: i64, tag_id: i64) -> Result<(), StorageError> {
        c.execute(
            "INSERT OR IGNORE INTO output_tag_map (output_id, tag_id) VALUES (?1, ?2)",
            params![output_id, tag_id],
        )?;
        Ok(())
    }

    pub fn tags_for_output(c: &Connection, output_id: i64) -> Result<Vec<String>, StorageError> {
        let mut stmt = c.prepare(
            "SELECT t.tag FROM output_tags t
             JOIN output_tag_map m ON m.tag_id = t.tag_id
             WHERE m.output_id = ?1 ORDER BY t.tag",
        )?;
        let tags = stmt
            .query_map(params![output_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    // -- actions ------------------------------------------------------

    const ACTION_COLS: &str = "action_id, user_id, txid, raw_tx, input_beef, status, satoshis, \
                               description, version, lock_time, is_outgoing, reference, created_at";

    fn action_from_row(row: &Row) -> rusqlite::Result<ActionRecord> {
        Ok(ActionRecord {
            action_id: row.get(0)?,
            user_id: row.get(1)?,
            txid: row.get(2)?,
            raw_tx: row.get(3)?,
            input_beef: row.get(4)?,
            status: status_of(row.get(5)?),
            satoshis: row.get(6)?,
            description: row.get(7)?,
            version: row.get(8)?,
            lock_time: row.get(9)?,
            is_outgoing: row.get(10)?,
            reference: row.get(11)?,
            created_at: parse_time(row.get(12)?),
        })
    }

    pub struct NewAction<'a> {
        pub user_id: i64,
        pub reference: &'a str,
        pub description: &'a str,
        pub version: u32,
        pub lock_time: u32,
        pub status: ActionStatus,
        pub satoshis: i64,
        pub is_outgoing: bool,
        pub input_beef: Option<&'a [u8]>,
    }

    pub fn insert_action(c: &Connection, new: &NewAction) -> Result<i64, StorageError> {
        c.execute(
            "INSERT INTO actions (user_id, status, satoshis, description, version, lock_time,
                                  is_outgoing, reference, input_beef, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                new.user_id,
                new.status.as_str(),
                new.satoshis,
                new.description,
                new.version,
                new.lock_time,
                new.is_outgoing,
                new.reference,
                new.input_beef,
                now(),
            ],
        )?;
        Ok(c.last_insert_rowid())
    }

    pub fn find_action_by_reference(
        c: &Connection,
        user_id: i64,
        reference: &str,
    ) -> Result<Option<ActionRecord>, StorageError> {
        Ok(c.query_row(
            &format!("SELECT {ACTION_COLS} FROM actions WHERE user_id = ?1 AND reference = ?2"),
            params![user_id, reference],
            action_from_row,
        )
        .optional()?)
    }

    pub fn find_action_by_id(
        c: &Connection,
        action_id: i64,
    ) -> Result<Option<ActionRecord>, StorageError> {
        Ok(c.query_row(
            &format!("SELECT {ACTION_COLS} FROM actions WHERE action_id = ?1"),
            params![action_id],
            action_from_row,
        )
        .optional()?)
    }

    /// Status update guarded by the state machine.
    pub fn update_action_status(
        c: &Connection,
        action_id: i64,
        status: ActionStatus,
    ) -> Result<(), StorageError> {
        let action = find_action_by_id(c, action_id)?.ok_or(StorageError::NotFound("action"))?;
        if !can_transition(action.status, status) {
            return Err(StorageError::InvalidTransition {
                from: action.status,
                to: status,
            });
        }
        c.execute(
            "UPDATE actions SET status = ?1 WHERE action_id = ?2",
            params![status.as_str(), action_id],
        )?;
        Ok(())
    }

    pub fn set_action_transaction(
        c: &Connection,
        action_id: i64,
        txid: &str,
        raw_tx: &[u8],
    ) -> Result<(), StorageError> {
        c.execute(
            "UPDATE actions SET txid = ?1, raw_tx = ?2 WHERE action_id = ?3",
            params![txid, raw_tx, action_id],
        )?;
        Ok(())
    }

    /// Store the unsigned draft; the txid stays unset until signing.
    pub fn set_action_raw_tx(
        c: &Connection,
        action_id: i64,
        raw_tx: &[u8],
    ) -> Result<(), StorageError> {
        c.execute(
            "UPDATE actions SET raw_tx = ?1 WHERE action_id = ?2",
            params![raw_tx, action_id],
        )?;
        Ok(())
    }

    // -- outputs ------------------------------------------------------

    const OUTPUT_COLS: &str = "output_id, user_id, action_id, vout, satoshis, locking_script, \
                               spendable, change, basket_id, spent_by_action_id, reserved_by, \
                               output_type, purpose, custom_instructions, derivation_prefix, \
                               derivation_suffix, sender_identity_key, created_at";

    fn output_from_row(row: &Row) -> rusqlite::Result<OutputRecord> {
        Ok(OutputRecord {
            output_id: row.get(0)?,
            user_id: row.get(1)?,
            action_id: row.get(2)?,
            vout: row.get(3)?,
            satoshis: row.get(4)?,
            locking_script: row.get(5)?,
            spendable: row.get(6)?,
            change: row.get(7)?,
            basket_id: row.get(8)?,
            spent_by_action_id: row.get(9)?,
            reserved_by: row.get(10)?,
            output_type: row.get(11)?,
            purpose: row.get(12)?,
            custom_instructions: row.get(13)?,
            derivation_prefix: row.get(14)?,
            derivation_suffix: row.get(15)?,
            sender_identity_key: row.get(16)?,
            created_at: parse_time(row.get(17)?),
        })
    }

    pub struct NewOutput<'a> {
        pub user_id: i64,
        pub action_id: i64,
        pub vout: u32,
        pub satoshis: i64,
        pub locking_script: Option<&'a str>,
        pub spendable: bool,
        pub change: bool,
        pub basket_id: Option<i64>,
        pub purpose: &'a str,
        pub custom_instructions: Option<&'a str>,
        pub derivation_prefix: Option<&'a str>,
        pub derivation_suffix: Option<&'a str>,
        pub sender_identity_key: Option<&'a str>,
    }

    pub fn insert_output(c: &Connection, new: &NewOutput) -> Result<i64, StorageError> {
        c.execute(
            "INSERT INTO outputs (user_id, action_id, vout, satoshis, locking_script, spendable,
                                  change, basket_id, purpose, custom_instructions,
                                  derivation_prefix, derivation_suffix, sender_identity_key,
                                  created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                new.user_id,
                new.action_id,
                new.vout,
                new.satoshis,
                new.locking_script,
                new.spendable,
                new.change,
                new.basket_id,
                new.purpose,
                new.custom_instructions,
                new.derivation_prefix,
                new.derivation_suffix,
                new.sender_identity_key,
                now(),
            ],
        )?;
        Ok(c.last_insert_rowid())
    }

    /// Unreserved spendable outputs, smallest first; ties break on the
    /// lower output id for reproducible selection.
    pub fn spendable_pool(c: &Connection, user_id: i64) -> Result<Vec<OutputRecord>, StorageError> {
        let mut stmt = c.prepare(&format!(
            "SELECT {OUTPUT_COLS} FROM outputs
             WHERE user_id = ?1 AND spendable = 1 AND reserved_by IS NULL
             ORDER BY satoshis ASC, output_id ASC"
        ))?;
        let outputs = stmt
            .query_map(params![user_id], output_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(outputs)
    }

    pub fn reserve_outputs(
        c: &Connection,
        user_id: i64,
        output_ids: &[i64],
        reserved_by: &str,
    ) -> Result<(), StorageError> {
        for &output_id in output_ids {
            let holder: Option<String> = c.query_row(
                "SELECT reserved_by FROM outputs WHERE output_id = ?1 AND user_id = ?2",
                params![output_id, user_id],
                |row| row.get(0),
            )?;
            if let Some(holder) = holder {
                if holder != reserved_by {
                    return Err(StorageError::ReservationConflict {
                        output_id,
                        reserved_by: holder,
                    });
                }
            }
        }
        for &output_id in output_ids {
            c.execute(
                "UPDATE outputs SET reserved_by = ?1 WHERE output_id = ?2",
                params![reserved_by, output_id],
            )?;
        }
        Ok(())
    }

    pub fn release_outputs(c: &Connection, reserved_by: &str) -> Result<(), StorageError> {
        c.execute(
            "UPDATE outputs SET reserved_by = NULL WHERE reserved_by = ?1",
            params![reserved_by],
        )?;
        Ok(())
    }

    pub fn outputs_reserved_by(
        c: &Connection,
        reserved_by: &str,
    ) -> Result<Vec<OutputRecord>, StorageError> {
        let mut stmt = c.prepare(&format!(
            "SELECT {OUTPUT_COLS} FROM outputs WHERE reserved_by = ?1 ORDER BY output_id"
        ))?;
        let outputs = stmt
            .query_map(params![reserved_by], output_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(outputs)
    }

    pub fn outputs_for_action(
        c: &Connection,
        action_id: i64,
    ) -> Result<Vec<OutputRecord>, StorageError> {
        let mut stmt = c.prepare(&format!(
            "SELECT {OUTPUT_COLS} FROM outputs WHERE action_id = ?1 ORDER BY vout"
        ))?;
        let outputs = stmt
            .query_map(params![action_id], output_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(outputs)
    }

    /// Output by `"txid.vout"` of the action that created it.
    pub fn find_output_by_outpoint(
        c: &Connection,
        user_id: i64,
        txid: &str,
        vout: u32,
    ) -> Result<Option<OutputRecord>, StorageError> {
        Ok(c.query_row(
            &format!(
                "SELECT {OUTPUT_COLS} FROM outputs o
                 WHERE o.user_id = ?1 AND o.vout = ?2
                   AND o.action_id IN (SELECT action_id FROM actions WHERE txid = ?3)"
            ),
            params![user_id, vout, txid],
            output_from_row,
        )
        .optional()?)
    }

    pub fn mark_spent(
        c: &Connection,
        output_id: i64,
        spent_by_action_id: i64,
    ) -> Result<(), StorageError> {
        c.execute(
            "UPDATE outputs SET spendable = 0, spent_by_action_id = ?1, reserved_by = NULL
             WHERE output_id = ?2",
            params![spent_by_action_id, output_id],
        )?;
        Ok(())
    }

    /// Activate an action's outputs as wallet property. Outputs paid
    /// away to other parties (no basket) stay non-spendable.
    pub fn activate_outputs(c: &Connection, action_id: i64) -> Result<(), StorageError> {
        c.execute(
            "UPDATE outputs SET spendable = (basket_id IS NOT NULL) WHERE action_id = ?1",
            params![action_id],
        )?;
        Ok(())
    }

    /// Retire every output created by an action, as abort or terminal
    /// rejection takes them off the table.
    pub fn deactivate_outputs(c: &Connection, action_id: i64) -> Result<(), StorageError> {
        c.execute(
            "UPDATE outputs SET spendable = 0 WHERE action_id = ?1",
            params![action_id],
        )?;
        Ok(())
    }

    /// Return the inputs a failed action had claimed to the spendable
    /// pool.
    pub fn unspend_inputs_of(c: &Connection, action_id: i64) -> Result<(), StorageError> {
        c.execute(
            "UPDATE outputs SET spendable = 1, spent_by_action_id = NULL
             WHERE spent_by_action_id = ?1",
            params![action_id],
        )?;
        Ok(())
    }

    pub fn relinquish_output(
        c: &Connection,
        user_id: i64,
        basket_id: i64,
        txid: &str,
        vout: u32,
    ) -> Result<bool, StorageError> {
        let output = find_output_by_outpoint(c, user_id, txid, vout)?;
        match output {
            Some(output) if output.basket_id == Some(basket_id) => {
                c.execute(
                    "UPDATE outputs SET basket_id = NULL, spendable = 0 WHERE output_id = ?1",
                    params![output.output_id],
                )?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn count_spendable_change(
        c: &Connection,
        user_id: i64,
        basket_id: i64,
    ) -> Result<i64, StorageError> {
        Ok(c.query_row(
            "SELECT COUNT(*) FROM outputs
             WHERE user_id = ?1 AND basket_id = ?2 AND change = 1 AND spendable = 1",
            params![user_id, basket_id],
            |row| row.get(0),
        )?)
    }

    // -- commissions --------------------------------------------------

    pub fn insert_commission(
        c: &Connection,
        user_id: i64,
        action_id: i64,
        satoshis: i64,
        locking_script: &str,
    ) -> Result<(), StorageError> {
        c.execute(
            "INSERT INTO commissions (user_id, action_id, satoshis, locking_script)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, action_id, satoshis, locking_script],
        )?;
        Ok(())
    }

    // -- proven txs ---------------------------------------------------

    pub fn insert_proven_tx(
        c: &Connection,
        txid: &str,
        block_height: u32,
        merkle_path: &[u8],
    ) -> Result<(), StorageError> {
        c.execute(
            "INSERT OR IGNORE INTO proven_txs (txid, block_height, merkle_path, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![txid, block_height, merkle_path, now()],
        )?;
        Ok(())
    }

    pub fn find_proven_tx(c: &Connection, txid: &str) -> Result<Option<ProvenTx>, StorageError> {
        Ok(c.query_row(
            "SELECT proven_tx_id, txid, block_height, merkle_path, created_at
             FROM proven_txs WHERE txid = ?1",
            params![txid],
            |row| {
                Ok(ProvenTx {
                    proven_tx_id: row.get(0)?,
                    txid: row.get(1)?,
                    block_height: row.get(2)?,
                    merkle_path: row.get(3)?,
                    created_at: parse_time(row.get(4)?),
                })
            },
        )
        .optional()?)
    }

    // -- broadcast requests -------------------------------------------

    const REQ_COLS: &str = "req_id, user_id, action_id, txid, raw_tx, status, attempts, \
                            last_status, last_error, created_at, updated_at";

    fn req_from_row(row: &Row) -> rusqlite::Result<BroadcastReq> {
        Ok(BroadcastReq {
            req_id: row.get(0)?,
            user_id: row.get(1)?,
            action_id: row.get(2)?,
            txid: row.get(3)?,
            raw_tx: row.get(4)?,
            status: status_of(row.get(5)?),
            attempts: row.get(6)?,
            last_status: row.get(7)?,
            last_error: row.get(8)?,
            created_at: parse_time(row.get(9)?),
            updated_at: parse_time(row.get(10)?),
        })
    }

    pub fn insert_req(
        c: &Connection,
        user_id: i64,
        action_id: i64,
        txid: &str,
        raw_tx: &[u8],
    ) -> Result<i64, StorageError> {
        c.execute(
            "INSERT INTO proven_tx_reqs (user_id, action_id, txid, raw_tx, status,
                                         created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                user_id,
                action_id,
                txid,
                raw_tx,
                ActionStatus::Unprocessed.as_str(),
                now(),
            ],
        )?;
        Ok(c.last_insert_rowid())
    }

    pub fn reqs_with_status(
        c: &Connection,
        statuses: &[ActionStatus],
    ) -> Result<Vec<BroadcastReq>, StorageError> {
        let placeholders = statuses
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = c.prepare(&format!(
            "SELECT {REQ_COLS} FROM proven_tx_reqs WHERE status IN ({placeholders})
             ORDER BY req_id"
        ))?;
        let reqs = stmt
            .query_map(
                rusqlite::params_from_iter(statuses.iter().map(|s| s.as_str())),
                req_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reqs)
    }

    pub fn find_req_by_action(
        c: &Connection,
        action_id: i64,
    ) -> Result<Option<BroadcastReq>, StorageError> {
        Ok(c.query_row(
            &format!("SELECT {REQ_COLS} FROM proven_tx_reqs WHERE action_id = ?1"),
            params![action_id],
            req_from_row,
        )
        .optional()?)
    }

    pub fn update_req(
        c: &Connection,
        req_id: i64,
        status: ActionStatus,
        attempts: i64,
        last_status: Option<&str>,
        last_error: Option<&str>,
    ) -> Result<(), StorageError> {
        c.execute(
            "UPDATE proven_tx_reqs
             SET status = ?1, attempts = ?2, last_status = ?3, last_error = ?4, updated_at = ?5
             WHERE req_id = ?6",
            params![status.as_str(), attempts, last_status, last_error, now(), req_id],
        )?;
        Ok(())
    }

    pub fn actions_with_status(
        c: &Connection,
        status: ActionStatus,
    ) -> Result<Vec<ActionRecord>, StorageError> {
        let mut stmt = c.prepare(&format!(
            "SELECT {ACTION_COLS} FROM actions WHERE status = ?1 ORDER BY action_id"
        ))?;
        let actions = stmt
            .query_map(params![status.as_str()], action_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(actions)
    }

    /// Actions in `status` created before `cutoff`.
    pub fn actions_older_than(
        c: &Connection,
        status: ActionStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ActionRecord>, StorageError> {
        Ok(actions_with_status(c, status)?
            .into_iter()
            .filter(|a| a.created_at < cutoff)
            .collect())
    }

    /// Remove an action and its dependents. Outputs spent by an action
    /// outside `purged_ids` survive as historical records.
    pub fn delete_action_cascade(
        c: &Connection,
        action_id: i64,
        purged_ids: &[i64],
    ) -> Result<u64, StorageError> {
        let outputs = outputs_for_action(c, action_id)?;
        let mut deleted = 0u64;
        for output in outputs {
            let keep = matches!(output.spent_by_action_id, Some(spender) if !purged_ids.contains(&spender));
            if keep {
                continue;
            }
            c.execute(
                "DELETE FROM outputs WHERE output_id = ?1",
                params![output.output_id],
            )?;
            deleted += 1;
        }
        c.execute(
            "DELETE FROM proven_tx_reqs WHERE action_id = ?1",
            params![action_id],
        )?;
        c.execute(
            "DELETE FROM commissions WHERE action_id = ?1",
            params![action_id],
        )?;
        c.execute(
            "DELETE FROM action_labels WHERE action_id = ?1",
            params![action_id],
        )?;
        c.execute("DELETE FROM actions WHERE action_id = ?1", params![action_id])?;
        Ok(deleted + 1)
    }

    // -- certificates -------------------------------------------------

    const CERT_COLS: &str = "certificate_id, user_id, certificate_type, serial_number, subject, \
                             certifier, revocation_outpoint, signature, fields";

    fn cert_from_row(row: &Row) -> rusqlite::Result<CertificateRecord> {
        let fields: String = row.get(8)?;
        Ok(CertificateRecord {
            certificate_id: row.get(0)?,
            user_id: row.get(1)?,
            certificate_type: row.get(2)?,
            serial_number: row.get(3)?,
            subject: row.get(4)?,
            certifier: row.get(5)?,
            revocation_outpoint: row.get(6)?,
            signature: row.get(7)?,
            fields: serde_json::from_str(&fields).unwrap_or_default(),
        })
    }

    pub fn insert_certificate(
        c: &Connection,
        cert: &CertificateRecord,
    ) -> Result<i64, StorageError> {
        c.execute(
            "INSERT INTO certificates (user_id, certificate_type, serial_number, subject,
                                       certifier, revocation_outpoint, signature, fields)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                cert.user_id,
                cert.certificate_type,
                cert.serial_number,
                cert.subject,
                cert.certifier,
                cert.revocation_outpoint,
                cert.signature,
                serde_json::to_string(&cert.fields).unwrap_or_else(|_| "{}".into()),
            ],
        )?;
        Ok(c.last_insert_rowid())
    }

    pub fn find_certificate(
        c: &Connection,
        user_id: i64,
        certificate_type: &str,
        serial_number: &str,
        certifier: &str,
    ) -> Result<Option<CertificateRecord>, StorageError> {
        Ok(c.query_row(
            &format!(
                "SELECT {CERT_COLS} FROM certificates
                 WHERE user_id = ?1 AND certificate_type = ?2 AND serial_number = ?3
                   AND certifier = ?4"
            ),
            params![user_id, certificate_type, serial_number, certifier],
            cert_from_row,
        )
        .optional()?)
    }

    pub fn delete_certificate(c: &Connection, certificate_id: i64) -> Result<bool, StorageError> {
        let n = c.execute(
            "DELETE FROM certificates WHERE certificate_id = ?1",
            params![certificate_id],
        )?;
        Ok(n > 0)
    }

    /// Certificates whose subject matches, newest first.
    pub fn certificates_by_subject(
        c: &Connection,
        user_id: i64,
        subject: &str,
        limit: u32,
        offset: u32,
    ) -> Result<(u32, Vec<CertificateRecord>), StorageError> {
        let total: u32 = c.query_row(
            "SELECT COUNT(*) FROM certificates WHERE user_id = ?1 AND subject = ?2",
            params![user_id, subject],
            |row| row.get(0),
        )?;
        let mut stmt = c.prepare(&format!(
            "SELECT {CERT_COLS} FROM certificates
             WHERE user_id = ?1 AND subject = ?2
             ORDER BY certificate_id DESC LIMIT ?3 OFFSET ?4"
        ))?;
        let certs = stmt
            .query_map(params![user_id, subject, limit, offset], cert_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, certs))
    }

    /// Certificates carrying every requested attribute value.
    pub fn certificates_by_attributes(
        c: &Connection,
        user_id: i64,
        attributes: &BTreeMap<String, String>,
        limit: u32,
        offset: u32,
    ) -> Result<(u32, Vec<CertificateRecord>), StorageError> {
        let mut stmt = c.prepare(&format!(
            "SELECT {CERT_COLS} FROM certificates WHERE user_id = ?1 ORDER BY certificate_id DESC"
        ))?;
        let all = stmt
            .query_map(params![user_id], cert_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let matching: Vec<_> = all
            .into_iter()
            .filter(|cert| {
                attributes
                    .iter()
                    .all(|(k, v)| cert.fields.get(k).map(|f| f == v).unwrap_or(false))
            })
            .collect();
        let total = matching.len() as u32;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((total, page))
    }
}
