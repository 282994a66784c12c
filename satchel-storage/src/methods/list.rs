//! Paginated reads over actions and outputs.
//!
//! Ordering is newest-first with the row id as tiebreaker; `total*`
//! counts the full match so callers can page past the end and still
//! see the real total.

use crate::provider::rows;
use crate::{StorageError, StorageProvider};
use rusqlite::types::ToSql;
use rusqlite::params_from_iter;
use satchel_codec::envelope::{
    ActionEntry, ActionStatus, ListActionsArgs, ListActionsResult, ListOutputsArgs,
    ListOutputsResult, OutputEntry, QueryMode, DEFAULT_LIST_LIMIT,
};

fn page_of(limit: Option<u32>, offset: Option<u32>) -> (u32, u32) {
    (limit.unwrap_or(DEFAULT_LIST_LIMIT), offset.unwrap_or(0))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn label_filter(labels: &[String], mode: QueryMode) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let ph = placeholders(labels.len());
    match mode {
        QueryMode::Any => format!(
            " AND a.action_id IN (
                 SELECT al.action_id FROM action_labels al
                 JOIN tx_labels l ON l.label_id = al.label_id
                 WHERE l.label IN ({ph}))"
        ),
        QueryMode::All => format!(
            " AND a.action_id IN (
                 SELECT al.action_id FROM action_labels al
                 JOIN tx_labels l ON l.label_id = al.label_id
                 WHERE l.label IN ({ph})
                 GROUP BY al.action_id
                 HAVING COUNT(DISTINCT l.label) = {})",
            labels.len()
        ),
    }
}

pub fn list_actions(
    provider: &StorageProvider,
    user_id: i64,
    args: &ListActionsArgs,
) -> Result<ListActionsResult, StorageError> {
    let (limit, offset) = page_of(args.limit, args.offset);
    let mode = args.label_query_mode.unwrap_or_default();
    let include_labels = args.include_labels.unwrap_or(false);

    provider.with_tx(|c| {
        let base = format!(
            "FROM actions a WHERE a.user_id = ?{}",
            label_filter(&args.labels, mode)
        );

        let mut filter_params: Vec<Box<dyn ToSql>> = vec![Box::new(user_id)];
        for label in &args.labels {
            filter_params.push(Box::new(label.clone()));
        }

        let total: u32 = c.query_row(
            &format!("SELECT COUNT(*) {base}"),
            params_from_iter(filter_params.iter().map(|p| p.as_ref())),
            |row| row.get(0),
        )?;

        let mut page_params = filter_params;
        page_params.push(Box::new(limit));
        page_params.push(Box::new(offset));

        let mut stmt = c.prepare(&format!(
            "SELECT a.action_id, a.txid, a.satoshis, a.status, a.is_outgoing, a.description,
                    a.version, a.lock_time
             {base}
             ORDER BY a.created_at DESC, a.action_id DESC
             LIMIT ? OFFSET ?"
        ))?;
        let rows_iter = stmt.query_map(
            params_from_iter(page_params.iter().map(|p| p.as_ref())),
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, u32>(7)?,
                ))
            },
        )?;

        let mut actions = Vec::new();
        for row in rows_iter {
            let (action_id, txid, satoshis, status, is_outgoing, description, version, lock_time) =
                row?;
            let labels = if include_labels {
                Some(rows::labels_for_action(c, action_id)?)
            } else {
                None
            };
            actions.push(ActionEntry {
                txid,
                satoshis,
                status: ActionStatus::from_str(&status).unwrap_or(ActionStatus::Failed),
                is_outgoing,
                description,
                version,
                lock_time,
                labels,
            });
        }

        Ok(ListActionsResult {
            total_actions: total,
            actions,
        })
    })
}

fn tag_filter(tags: &[String], mode: QueryMode) -> String {
    if tags.is_empty() {
        return String::new();
    }
    let ph = placeholders(tags.len());
    match mode {
        QueryMode::Any => format!(
            " AND o.output_id IN (
                 SELECT m.output_id FROM output_tag_map m
                 JOIN output_tags t ON t.tag_id = m.tag_id
                 WHERE t.tag IN ({ph}))"
        ),
        QueryMode::All => format!(
            " AND o.output_id IN (
                 SELECT m.output_id FROM output_tag_map m
                 JOIN output_tags t ON t.tag_id = m.tag_id
                 WHERE t.tag IN ({ph})
                 GROUP BY m.output_id
                 HAVING COUNT(DISTINCT t.tag) = {})",
            tags.len()
        ),
    }
}

pub fn list_outputs(
    provider: &StorageProvider,
    user_id: i64,
    args: &ListOutputsArgs,
) -> Result<ListOutputsResult, StorageError> {
    let (limit, offset) = page_of(args.limit, args.offset);
    let mode = args.tag_query_mode.unwrap_or_default();
    let include_scripts = args.include_locking_scripts.unwrap_or(false);
    let include_tags = args.include_tags.unwrap_or(false);

    provider.with_tx(|c| {
        let basket = rows::find_basket(c, user_id, &args.basket)?
            .ok_or(StorageError::NotFound("basket"))?;

        // Only outputs whose owning action has a txid are listable;
        // drafts have no outpoint yet.
        let base = format!(
            "FROM outputs o JOIN actions a ON a.action_id = o.action_id
             WHERE o.user_id = ? AND o.basket_id = ? AND a.txid IS NOT NULL{}",
            tag_filter(&args.tags, mode)
        );

        let mut filter_params: Vec<Box<dyn ToSql>> =
            vec![Box::new(user_id), Box::new(basket.basket_id)];
        for tag in &args.tags {
            filter_params.push(Box::new(tag.clone()));
        }

        let total: u32 = c.query_row(
            &format!("SELECT COUNT(*) {base}"),
            params_from_iter(filter_params.iter().map(|p| p.as_ref())),
            |row| row.get(0),
        )?;

        let mut page_params = filter_params;
        page_params.push(Box::new(limit));
        page_params.push(Box::new(offset));

        let mut stmt = c.prepare(&format!(
            "SELECT o.output_id, a.txid, o.vout, o.satoshis, o.spendable, o.locking_script,
                    o.custom_instructions
             {base}
             ORDER BY o.created_at DESC, o.output_id DESC
             LIMIT ? OFFSET ?"
        ))?;
        let rows_iter = stmt.query_map(
            params_from_iter(page_params.iter().map(|p| p.as_ref())),
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )?;

        let mut outputs = Vec::new();
        for row in rows_iter {
            let (output_id, txid, vout, satoshis, spendable, locking_script, custom) = row?;
            let tags = if include_tags {
                Some(rows::tags_for_output(c, output_id)?)
            } else {
                None
            };
            outputs.push(OutputEntry {
                outpoint: format!("{txid}.{vout}"),
                satoshis: satoshis as u64,
                spendable,
                locking_script: include_scripts.then_some(locking_script).flatten(),
                custom_instructions: custom,
                tags,
            });
        }

        Ok(ListOutputsResult {
            total_outputs: total,
            outputs,
        })
    })
}
