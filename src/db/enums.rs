use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a provisioned resource (host or IT service).
/// Transitions are owned by `crate::lifecycle`; nothing else may write this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text", enum_name = "resource_state_enum")]
pub enum ResourceState {
    #[sea_orm(string_value = "CREATION_SCHEDULED")]
    CreationScheduled,
    #[sea_orm(string_value = "CREATING")]
    Creating,
    #[sea_orm(string_value = "UPDATE_SCHEDULED")]
    UpdateScheduled,
    #[sea_orm(string_value = "UPDATING")]
    Updating,
    #[sea_orm(string_value = "DELETION_SCHEDULED")]
    DeletionScheduled,
    #[sea_orm(string_value = "DELETING")]
    Deleting,
    #[sea_orm(string_value = "OK")]
    Ok,
    #[sea_orm(string_value = "ERRED")]
    Erred,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ResourceState {
    /// States from which no transition is currently in flight or scheduled.
    pub fn is_stable(&self) -> bool {
        matches!(self, ResourceState::Ok | ResourceState::Erred)
    }
}

/// Value type of a monitoring item, mirroring the remote server's integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum ValueType {
    #[sea_orm(num_value = 0)]
    Float,
    #[sea_orm(num_value = 1)]
    Character,
    #[sea_orm(num_value = 2)]
    Log,
    #[sea_orm(num_value = 3)]
    Unsigned,
    #[sea_orm(num_value = 4)]
    Text,
}

impl ValueType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Float | ValueType::Unsigned)
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ValueType::Float),
            1 => Some(ValueType::Character),
            2 => Some(ValueType::Log),
            3 => Some(ValueType::Unsigned),
            4 => Some(ValueType::Text),
            _ => None,
        }
    }
}

/// SLA calculation algorithm of an IT service, remote integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum SlaAlgorithm {
    #[sea_orm(num_value = 0)]
    SkipCalculation,
    #[sea_orm(num_value = 1)]
    ProblemIfAnyChild,
    #[sea_orm(num_value = 2)]
    ProblemIfAllChildren,
}

impl SlaAlgorithm {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(SlaAlgorithm::SkipCalculation),
            1 => Some(SlaAlgorithm::ProblemIfAnyChild),
            2 => Some(SlaAlgorithm::ProblemIfAllChildren),
            _ => None,
        }
    }
}

/// State recorded for one SLA history event. A trigger event with value 0
/// means the trigger returned to OK (service up); any other value is a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text", enum_name = "event_state_enum")]
pub enum EventState {
    #[sea_orm(string_value = "U")]
    Up,
    #[sea_orm(string_value = "D")]
    Down,
}

impl EventState {
    pub fn from_trigger_value(value: i64) -> Self {
        if value == 0 {
            EventState::Up
        } else {
            EventState::Down
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_codes() {
        for code in 0..=4 {
            assert!(ValueType::from_code(code).is_some());
        }
        assert!(ValueType::from_code(5).is_none());
        assert!(ValueType::Float.is_numeric());
        assert!(ValueType::Unsigned.is_numeric());
        assert!(!ValueType::Text.is_numeric());
    }

    #[test]
    fn test_event_state_from_trigger_value() {
        assert_eq!(EventState::from_trigger_value(0), EventState::Up);
        assert_eq!(EventState::from_trigger_value(1), EventState::Down);
        assert_eq!(EventState::from_trigger_value(3), EventState::Down);
    }
}
