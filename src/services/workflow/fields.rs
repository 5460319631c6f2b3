//! Typed accessor map for shipment evidence fields.
//!
//! Stage definitions name shipment fields (`bl_number`, `loading_date`, …)
//! that must hold a value before the stage completes. The original system
//! resolved those names by runtime attribute lookup; here each name maps to
//! a typed getter/setter pair registered once, so a typo in configuration
//! surfaces as an unresolvable field instead of silent misbehavior.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::entities::shipment;
use crate::errors::ServiceError;

/// A value supplied as checkpoint evidence or read back from the shipment.
///
/// Untagged: variant order matters, `Text` must stay last or every date
/// string would deserialize as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    /// Empty strings count as absent, mirroring how the fields behave as
    /// form inputs upstream.
    pub fn is_present(&self) -> bool {
        match self {
            FieldValue::Text(s) => !s.is_empty(),
            _ => true,
        }
    }
}

type Getter = fn(&shipment::Model) -> Option<FieldValue>;
type Setter = fn(&mut shipment::ActiveModel, FieldValue) -> Result<(), ServiceError>;

/// Getter/setter pair for one named shipment field.
pub struct FieldAccessor {
    pub name: &'static str,
    get: Getter,
    set: Setter,
}

impl FieldAccessor {
    pub fn get(&self, model: &shipment::Model) -> Option<FieldValue> {
        (self.get)(model).filter(FieldValue::is_present)
    }

    pub fn set(
        &self,
        active: &mut shipment::ActiveModel,
        value: FieldValue,
    ) -> Result<(), ServiceError> {
        (self.set)(active, value)
    }
}

macro_rules! text_accessor {
    ($field:ident) => {
        FieldAccessor {
            name: stringify!($field),
            get: |m| m.$field.clone().map(FieldValue::Text),
            set: |a, v| match v {
                FieldValue::Text(s) => {
                    a.$field = Set(Some(s));
                    Ok(())
                }
                other => Err(ServiceError::ValidationError(format!(
                    "field {} expects text, got {:?}",
                    stringify!($field),
                    other
                ))),
            },
        }
    };
}

macro_rules! date_accessor {
    ($field:ident) => {
        FieldAccessor {
            name: stringify!($field),
            get: |m| m.$field.map(FieldValue::Date),
            set: |a, v| match v {
                FieldValue::Date(d) => {
                    a.$field = Set(Some(d));
                    Ok(())
                }
                other => Err(ServiceError::ValidationError(format!(
                    "field {} expects a date, got {:?}",
                    stringify!($field),
                    other
                ))),
            },
        }
    };
}

macro_rules! timestamp_accessor {
    ($field:ident) => {
        FieldAccessor {
            name: stringify!($field),
            get: |m| m.$field.map(FieldValue::Timestamp),
            set: |a, v| match v {
                FieldValue::Timestamp(t) => {
                    a.$field = Set(Some(t));
                    Ok(())
                }
                other => Err(ServiceError::ValidationError(format!(
                    "field {} expects a timestamp, got {:?}",
                    stringify!($field),
                    other
                ))),
            },
        }
    };
}

static REGISTRY: Lazy<HashMap<&'static str, FieldAccessor>> = Lazy::new(|| {
    let accessors = [
        text_accessor!(pol),
        text_accessor!(pod),
        text_accessor!(signer),
        text_accessor!(leader),
        text_accessor!(customer_reference),
        text_accessor!(cons_point),
        text_accessor!(city),
        text_accessor!(carrier),
        text_accessor!(origin_agent),
        text_accessor!(destination_agent),
        text_accessor!(agents_note),
        text_accessor!(tracking_number),
        text_accessor!(bl_number),
        text_accessor!(inspection_no),
        text_accessor!(notes),
        text_accessor!(shipping_document),
        text_accessor!(booking_document),
        timestamp_accessor!(loading_date),
        timestamp_accessor!(bl_date),
        date_accessor!(shipping_date),
        date_accessor!(eta_destination),
        date_accessor!(ata_destination),
    ];
    accessors.into_iter().map(|a| (a.name, a)).collect()
});

/// Looks up the accessor for a configured field name. `None` means the
/// configuration references a field this engine does not know.
pub fn accessor(name: &str) -> Option<&'static FieldAccessor> {
    REGISTRY.get(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn blank_shipment() -> shipment::Model {
        shipment::Model {
            id: uuid::Uuid::new_v4(),
            status: "pre_loading".to_string(),
            pol: None,
            pod: None,
            signer: None,
            leader: None,
            customer_reference: None,
            loading_date: None,
            shipping_date: None,
            cons_point: None,
            city: None,
            carrier: None,
            origin_agent: None,
            destination_agent: None,
            agents_note: None,
            tracking_number: None,
            bl_number: None,
            bl_date: None,
            inspection_no: None,
            eta_destination: None,
            ata_destination: None,
            notes: None,
            shipping_document: None,
            booking_document: None,
            created_at: chrono::Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn unknown_names_have_no_accessor() {
        assert!(accessor("warp_core_temperature").is_none());
        assert!(accessor("bl_number").is_some());
    }

    #[test]
    fn empty_text_reads_as_absent() {
        let mut model = blank_shipment();
        model.bl_number = Some(String::new());
        assert_eq!(accessor("bl_number").unwrap().get(&model), None);

        model.bl_number = Some("MBL-123".to_string());
        assert_eq!(
            accessor("bl_number").unwrap().get(&model),
            Some(FieldValue::Text("MBL-123".to_string()))
        );
    }

    #[test]
    fn values_deserialize_untagged_from_json() {
        let text: FieldValue = serde_json::from_str("\"MBL-123\"").unwrap();
        assert_eq!(text, FieldValue::Text("MBL-123".to_string()));

        let date: FieldValue = serde_json::from_str("\"2024-06-01\"").unwrap();
        assert_eq!(
            date,
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        );
    }

    #[test]
    fn setter_rejects_mismatched_types() {
        let mut active = shipment::ActiveModel::default();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(accessor("bl_number")
            .unwrap()
            .set(&mut active, FieldValue::Date(date))
            .is_err());
        assert!(accessor("eta_destination")
            .unwrap()
            .set(&mut active, FieldValue::Date(date))
            .is_ok());
    }
}
