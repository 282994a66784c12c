//! Envelopes for the paginated read surface: `listActions` and
//! `listOutputs`.

use super::ActionStatus;
use crate::{Error, FromWire, Reader, ToWire, Writer};
use serde::{Deserialize, Serialize};

/// How multiple label/tag filters combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Any,
    All,
}

impl ToWire for QueryMode {
    fn to_wire(&self, w: &mut Writer) {
        w.put_u8(match self {
            QueryMode::Any => 0,
            QueryMode::All => 1,
        });
    }
}

impl FromWire for QueryMode {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        match r.get_u8()? {
            0 => Ok(QueryMode::Any),
            1 => Ok(QueryMode::All),
            value => Err(Error::InvalidDiscriminant {
                what: "query mode",
                value,
            }),
        }
    }
}

pub const DEFAULT_LIST_LIMIT: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListActionsArgs {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_query_mode: Option<QueryMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_labels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl ToWire for ListActionsArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_seq(&self.labels);
        w.put_option(&self.label_query_mode);
        w.put_option(&self.include_labels);
        w.put_option(&self.limit);
        w.put_option(&self.offset);
    }
}

impl FromWire for ListActionsArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(ListActionsArgs {
            labels: r.get_seq()?,
            label_query_mode: r.get_option()?,
            include_labels: r.get_option()?,
            limit: r.get_option()?,
            offset: r.get_option()?,
        })
    }
}

/// One action row in a `listActions` page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    /// Net effect on the user's holdings, negative for outgoing value.
    pub satoshis: i64,
    pub status: ActionStatus,
    pub is_outgoing: bool,
    pub description: String,
    pub version: u32,
    pub lock_time: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl ToWire for ActionEntry {
    fn to_wire(&self, w: &mut Writer) {
        w.put_option(&self.txid);
        w.put_i64(self.satoshis);
        self.status.to_wire(w);
        w.put_bool(self.is_outgoing);
        w.put_string(&self.description);
        w.put_u32(self.version);
        w.put_u32(self.lock_time);
        w.put_option_with(self.labels.is_some(), |w| {
            w.put_seq(self.labels.as_deref().unwrap_or_default())
        });
    }
}

impl FromWire for ActionEntry {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(ActionEntry {
            txid: r.get_option()?,
            satoshis: r.get_i64()?,
            status: ActionStatus::from_wire(r)?,
            is_outgoing: r.get_bool()?,
            description: r.get_string()?,
            version: r.get_u32()?,
            lock_time: r.get_u32()?,
            labels: r.get_option_with(|r| r.get_seq())?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListActionsResult {
    pub total_actions: u32,
    pub actions: Vec<ActionEntry>,
}

impl ToWire for ListActionsResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_u32(self.total_actions);
        w.put_seq(&self.actions);
    }
}

impl FromWire for ListActionsResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(ListActionsResult {
            total_actions: r.get_u32()?,
            actions: r.get_seq()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutputsArgs {
    pub basket: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_query_mode: Option<QueryMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_locking_scripts: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_tags: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl ToWire for ListOutputsArgs {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.basket);
        w.put_seq(&self.tags);
        w.put_option(&self.tag_query_mode);
        w.put_option(&self.include_locking_scripts);
        w.put_option(&self.include_tags);
        w.put_option(&self.limit);
        w.put_option(&self.offset);
    }
}

impl FromWire for ListOutputsArgs {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(ListOutputsArgs {
            basket: r.get_string()?,
            tags: r.get_seq()?,
            tag_query_mode: r.get_option()?,
            include_locking_scripts: r.get_option()?,
            include_tags: r.get_option()?,
            limit: r.get_option()?,
            offset: r.get_option()?,
        })
    }
}

/// One output row in a `listOutputs` page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEntry {
    /// `"txid.vout"` reference.
    pub outpoint: String,
    pub satoshis: u64,
    pub spendable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locking_script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ToWire for OutputEntry {
    fn to_wire(&self, w: &mut Writer) {
        w.put_string(&self.outpoint);
        w.put_u64(self.satoshis);
        w.put_bool(self.spendable);
        w.put_option(&self.locking_script);
        w.put_option(&self.custom_instructions);
        w.put_option_with(self.tags.is_some(), |w| {
            w.put_seq(self.tags.as_deref().unwrap_or_default())
        });
    }
}

impl FromWire for OutputEntry {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(OutputEntry {
            outpoint: r.get_string()?,
            satoshis: r.get_u64()?,
            spendable: r.get_bool()?,
            locking_script: r.get_option()?,
            custom_instructions: r.get_option()?,
            tags: r.get_option_with(|r| r.get_seq())?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutputsResult {
    pub total_outputs: u32,
    pub outputs: Vec<OutputEntry>,
}

impl ToWire for ListOutputsResult {
    fn to_wire(&self, w: &mut Writer) {
        w.put_u32(self.total_outputs);
        w.put_seq(&self.outputs);
    }
}

impl FromWire for ListOutputsResult {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        Ok(ListOutputsResult {
            total_outputs: r.get_u32()?,
            outputs: r.get_seq()?,
        })
    }
}
