//! Domain Events
//!
//! Event definitions for Event Sourcing.
//! Events are immutable facts that have happened in the system.
//!
//! Each aggregate owns a closed enum of its event payloads. The envelope
//! stores the type name next to the JSON payload, so payloads serialize
//! without an inline tag and are decoded through the type registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{
    AccountType, ActiveMonth, BankName, Currency, FileType, Money, MovementAction,
    OperationContext, RawRowData,
};

/// Payload enum of one aggregate's events
pub trait EventPayload: Clone + fmt::Debug + Send + Sync + 'static {
    /// Stable type name written to the event log
    fn event_type(&self) -> &'static str;

    /// JSON encoding of the payload (without type tag)
    fn encode(&self) -> Result<Vec<u8>, serde_json::Error>;
}

/// A committed (or about to be committed) event with its stream coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    /// 1-based position of the event in its aggregate's history
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub metadata: OperationContext,
    pub data: E,
}

impl<E: EventPayload> Event<E> {
    pub fn event_type(&self) -> &'static str {
        self.data.event_type()
    }

    /// `"{aggregateType}-{aggregateId}@{version}"`, used as causation id
    pub fn coordinate(&self) -> String {
        format!("{}-{}@{}", self.aggregate_type, self.aggregate_id, self.version)
    }

    /// Re-type the payload, keeping the coordinate
    pub fn map<T>(self, f: impl FnOnce(E) -> T) -> Event<T> {
        Event {
            aggregate_type: self.aggregate_type,
            aggregate_id: self.aggregate_id,
            version: self.version,
            created_at: self.created_at,
            metadata: self.metadata,
            data: f(self.data),
        }
    }
}

macro_rules! payload_type_names {
    ($($name:ident = $value:literal;)+) => {
        $(pub const $name: &str = $value;)+
    };
}

// =========================================================================
// Account
// =========================================================================

payload_type_names! {
    NEW_ACCOUNT_REGISTERED = "new_account_registered";
    NEXT_MONTH_STARTED = "next_month_started";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccountRegisteredData {
    pub account_id: Uuid,
    pub bank_name: BankName,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub starting_balance: Money,
    pub starting_balance_date: DateTime<Utc>,
    pub currency: Currency,
    pub notes: Option<String>,
    pub active_month: ActiveMonth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextMonthStartedData {
    pub account_id: Uuid,
    pub balance: Money,
    pub next_month: ActiveMonth,
}

/// Account-related events
#[derive(Debug, Clone, PartialEq)]
pub enum AccountEvent {
    NewAccountRegistered(NewAccountRegisteredData),
    NextMonthStarted(NextMonthStartedData),
}

impl EventPayload for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::NewAccountRegistered(_) => NEW_ACCOUNT_REGISTERED,
            AccountEvent::NextMonthStarted(_) => NEXT_MONTH_STARTED,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            AccountEvent::NewAccountRegistered(data) => serde_json::to_vec(data),
            AccountEvent::NextMonthStarted(data) => serde_json::to_vec(data),
        }
    }
}

// =========================================================================
// AccountMonth (ledger)
// =========================================================================

payload_type_names! {
    ACCOUNT_MONTH_STARTED = "account_month_started";
    NEW_ACCOUNT_MOVEMENT_REGISTERED = "new_account_movement_registered";
    ACCOUNT_MONTH_ENDED = "account_month_ended";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMonthStartedData {
    pub account_month_id: Uuid,
    pub account_id: Uuid,
    pub start_balance: Money,
    pub month: ActiveMonth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccountMovementRegisteredData {
    pub account_month_id: Uuid,
    pub account_movement_id: Uuid,
    pub movement_type_id: Option<Uuid>,
    pub action: MovementAction,
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub source_account_id: Option<Uuid>,
    pub description: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMonthEndedData {
    pub account_month_id: Uuid,
    pub account_id: Uuid,
    pub end_balance: Money,
    pub month: ActiveMonth,
}

/// Ledger month events
#[derive(Debug, Clone, PartialEq)]
pub enum AccountMonthEvent {
    MonthStarted(AccountMonthStartedData),
    NewAccountMovementRegistered(NewAccountMovementRegisteredData),
    MonthEnded(AccountMonthEndedData),
}

impl EventPayload for AccountMonthEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountMonthEvent::MonthStarted(_) => ACCOUNT_MONTH_STARTED,
            AccountMonthEvent::NewAccountMovementRegistered(_) => NEW_ACCOUNT_MOVEMENT_REGISTERED,
            AccountMonthEvent::MonthEnded(_) => ACCOUNT_MONTH_ENDED,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            AccountMonthEvent::MonthStarted(data) => serde_json::to_vec(data),
            AccountMonthEvent::NewAccountMovementRegistered(data) => serde_json::to_vec(data),
            AccountMonthEvent::MonthEnded(data) => serde_json::to_vec(data),
        }
    }
}

// =========================================================================
// ImportFile
// =========================================================================

payload_type_names! {
    NEW_IMPORT_FILE_REGISTERED = "new_import_file_registered";
    FILE_PARSE_STARTED = "file_parse_started";
    FILE_PARSE_RESTARTED = "file_parse_restarted";
    FILE_PARSE_ENDED = "file_parse_ended";
    FILE_PARSE_FAILED = "file_parse_failed";
    FILE_DATA_ROW_ADDED = "file_data_row_added";
    FILE_DATA_ROW_MARKED_AS_VERIFIED = "file_data_row_marked_as_verified";
    FILE_DATA_ROW_MARKED_AS_INVALID = "file_data_row_marked_as_invalid";
    ACCOUNT_MOVEMENT_ID_FOR_VERIFIED_FILE_DATA_ROW_REGISTERED =
        "account_movement_id_for_verified_file_data_row_registered";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewImportFileRegisteredData {
    pub import_file_id: Uuid,
    pub account_id: Uuid,
    pub filename: String,
    pub file_type: FileType,
}

/// Payload shared by the parse lifecycle events that only carry the file id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileParseTransitionData {
    pub import_file_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileParseFailedData {
    pub import_file_id: Uuid,
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDataRowAddedData {
    pub import_file_id: Uuid,
    pub file_data_row_id: Uuid,
    pub date: DateTime<Utc>,
    pub description: String,
    pub amount: Money,
    #[serde(default)]
    pub raw_data: RawRowData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDataRowMarkedAsVerifiedData {
    pub import_file_id: Uuid,
    pub file_data_row_id: Uuid,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_type_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account_id: Option<Uuid>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDataRowMarkedAsInvalidData {
    pub import_file_id: Uuid,
    pub file_data_row_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMovementIdRegisteredData {
    pub import_file_id: Uuid,
    pub file_data_row_id: Uuid,
    pub account_movement_id: Uuid,
}

/// Import file events
///
/// ```text
/// new_import_file_registered
///   -> file_parse_started
///        -> file_parse_ended -> file_data_row_added ...
///        -> file_parse_failed -> file_parse_restarted -> ...
/// file_data_row_added
///   -> file_data_row_marked_as_verified
///        -> account_movement_id_for_verified_file_data_row_registered
///   -> file_data_row_marked_as_invalid
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ImportFileEvent {
    NewImportFileRegistered(NewImportFileRegisteredData),
    FileParseStarted(FileParseTransitionData),
    FileParseRestarted(FileParseTransitionData),
    FileParseEnded(FileParseTransitionData),
    FileParseFailed(FileParseFailedData),
    FileDataRowAdded(FileDataRowAddedData),
    FileDataRowMarkedAsVerified(FileDataRowMarkedAsVerifiedData),
    FileDataRowMarkedAsInvalid(FileDataRowMarkedAsInvalidData),
    AccountMovementIdForVerifiedFileDataRowRegistered(AccountMovementIdRegisteredData),
}

impl EventPayload for ImportFileEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ImportFileEvent::NewImportFileRegistered(_) => NEW_IMPORT_FILE_REGISTERED,
            ImportFileEvent::FileParseStarted(_) => FILE_PARSE_STARTED,
            ImportFileEvent::FileParseRestarted(_) => FILE_PARSE_RESTARTED,
            ImportFileEvent::FileParseEnded(_) => FILE_PARSE_ENDED,
            ImportFileEvent::FileParseFailed(_) => FILE_PARSE_FAILED,
            ImportFileEvent::FileDataRowAdded(_) => FILE_DATA_ROW_ADDED,
            ImportFileEvent::FileDataRowMarkedAsVerified(_) => FILE_DATA_ROW_MARKED_AS_VERIFIED,
            ImportFileEvent::FileDataRowMarkedAsInvalid(_) => FILE_DATA_ROW_MARKED_AS_INVALID,
            ImportFileEvent::AccountMovementIdForVerifiedFileDataRowRegistered(_) => {
                ACCOUNT_MOVEMENT_ID_FOR_VERIFIED_FILE_DATA_ROW_REGISTERED
            }
        }
    }

    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            ImportFileEvent::NewImportFileRegistered(data) => serde_json::to_vec(data),
            ImportFileEvent::FileParseStarted(data)
            | ImportFileEvent::FileParseRestarted(data)
            | ImportFileEvent::FileParseEnded(data) => serde_json::to_vec(data),
            ImportFileEvent::FileParseFailed(data) => serde_json::to_vec(data),
            ImportFileEvent::FileDataRowAdded(data) => serde_json::to_vec(data),
            ImportFileEvent::FileDataRowMarkedAsVerified(data) => serde_json::to_vec(data),
            ImportFileEvent::FileDataRowMarkedAsInvalid(data) => serde_json::to_vec(data),
            ImportFileEvent::AccountMovementIdForVerifiedFileDataRowRegistered(data) => {
                serde_json::to_vec(data)
            }
        }
    }
}

// =========================================================================
// MovementType
// =========================================================================

payload_type_names! {
    NEW_MOVEMENT_TYPE_REGISTERED = "new_movement_type_registered";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMovementTypeRegisteredData {
    pub movement_type_id: Uuid,
    pub action: MovementAction,
    pub account_id: Uuid,
    pub source_account_id: Option<Uuid>,
    pub description: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MovementTypeEvent {
    NewMovementTypeRegistered(NewMovementTypeRegisteredData),
}

impl EventPayload for MovementTypeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MovementTypeEvent::NewMovementTypeRegistered(_) => NEW_MOVEMENT_TYPE_REGISTERED,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            MovementTypeEvent::NewMovementTypeRegistered(data) => serde_json::to_vec(data),
        }
    }
}

// =========================================================================
// TagCategory
// =========================================================================

payload_type_names! {
    NEW_TAG_ADDED_TO_NEW_CATEGORY = "new_tag_added_to_new_category";
    NEW_TAG_ADDED_TO_EXISTING_CATEGORY = "new_tag_added_to_existing_category";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTagAddedToNewCategoryData {
    pub tag_category_id: Uuid,
    pub tag_category_name: String,
    pub tag_category_notes: Option<String>,
    pub tag_id: Uuid,
    pub tag_name: String,
    pub tag_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTagAddedToExistingCategoryData {
    pub tag_category_id: Uuid,
    pub tag_id: Uuid,
    pub name: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagCategoryEvent {
    NewTagAddedToNewCategory(NewTagAddedToNewCategoryData),
    NewTagAddedToExistingCategory(NewTagAddedToExistingCategoryData),
}

impl EventPayload for TagCategoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TagCategoryEvent::NewTagAddedToNewCategory(_) => NEW_TAG_ADDED_TO_NEW_CATEGORY,
            TagCategoryEvent::NewTagAddedToExistingCategory(_) => {
                NEW_TAG_ADDED_TO_EXISTING_CATEGORY
            }
        }
    }

    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            TagCategoryEvent::NewTagAddedToNewCategory(data) => serde_json::to_vec(data),
            TagCategoryEvent::NewTagAddedToExistingCategory(data) => serde_json::to_vec(data),
        }
    }
}

// =========================================================================
// DomainEvent: every payload the registry can decode
// =========================================================================

/// Closed sum over all aggregates' event payloads
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Account(AccountEvent),
    AccountMonth(AccountMonthEvent),
    ImportFile(ImportFileEvent),
    MovementType(MovementTypeEvent),
    TagCategory(TagCategoryEvent),
}

impl EventPayload for DomainEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::Account(event) => event.event_type(),
            DomainEvent::AccountMonth(event) => event.event_type(),
            DomainEvent::ImportFile(event) => event.event_type(),
            DomainEvent::MovementType(event) => event.event_type(),
            DomainEvent::TagCategory(event) => event.event_type(),
        }
    }

    fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            DomainEvent::Account(event) => event.encode(),
            DomainEvent::AccountMonth(event) => event.encode(),
            DomainEvent::ImportFile(event) => event.encode(),
            DomainEvent::MovementType(event) => event.encode(),
            DomainEvent::TagCategory(event) => event.encode(),
        }
    }
}

macro_rules! domain_event_conversions {
    ($($variant:ident($payload:ty)),+ $(,)?) => {
        $(
            impl From<$payload> for DomainEvent {
                fn from(event: $payload) -> Self {
                    DomainEvent::$variant(event)
                }
            }

            impl TryFrom<DomainEvent> for $payload {
                type Error = DomainEvent;

                fn try_from(event: DomainEvent) -> Result<Self, Self::Error> {
                    match event {
                        DomainEvent::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )+
    };
}

domain_event_conversions! {
    Account(AccountEvent),
    AccountMonth(AccountMonthEvent),
    ImportFile(ImportFileEvent),
    MovementType(MovementTypeEvent),
    TagCategory(TagCategoryEvent),
}
