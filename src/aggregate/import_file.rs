//! ImportFile Aggregate
//!
//! A bank statement file going through parsing and row review.
//!
//! ```text
//! imported -> parsingStarted -> parsingEnded
//!                            -> parsingFailed -> parsingRestarted -> parsingEnded
//!                                                                 -> parsingFailed
//! ```
//!
//! Rows can only be added and reviewed once parsing has ended. A row starts
//! `unverified` and is either verified (and later linked to the ledger
//! movement created for it) or invalidated.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::{
    AccountMovementIdRegisteredData, FileDataRowAddedData, FileDataRowMarkedAsInvalidData,
    FileDataRowMarkedAsVerifiedData, FileParseFailedData, FileParseTransitionData,
    NewImportFileRegisteredData, ACCOUNT_MOVEMENT_ID_FOR_VERIFIED_FILE_DATA_ROW_REGISTERED,
    FILE_DATA_ROW_ADDED, FILE_DATA_ROW_MARKED_AS_INVALID, FILE_DATA_ROW_MARKED_AS_VERIFIED,
    FILE_PARSE_ENDED, FILE_PARSE_FAILED, FILE_PARSE_RESTARTED, FILE_PARSE_STARTED,
    NEW_IMPORT_FILE_REGISTERED,
};
use crate::domain::{DomainError, Event, FileType, ImportFileEvent, Money, RawRowData};
use crate::event_store::TypeRegistryBuilder;

use super::{Aggregate, AggregateCommand};

pub const AGGREGATE_TYPE: &str = "importFile";

pub const REGISTER_NEW_IMPORT_FILE: &str = "register_new_import_file";
pub const START_FILE_PARSE: &str = "start_file_parse";
pub const RESTART_FILE_PARSE: &str = "restart_file_parse";
pub const END_FILE_PARSE: &str = "end_file_parse";
pub const FAIL_FILE_PARSE: &str = "fail_file_parse";
pub const ADD_FILE_DATA_ROW: &str = "add_file_data_row";
pub const VERIFY_FILE_DATA_ROW: &str = "verify_file_data_row_command";
pub const INVALIDATE_FILE_DATA_ROW: &str = "invalidate_file_data_row_command";
pub const REGISTER_ACCOUNT_MOVEMENT_ID_FOR_VERIFIED_FILE_DATA_ROW: &str =
    "register_account_movement_verified_file_data_row_command";

// =========================================================================
// Commands
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterNewImportFile {
    pub import_file_id: Uuid,
    pub account_id: Uuid,
    pub filename: String,
    pub file_type: FileType,
}

/// Parse lifecycle commands that only address the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileParseTransition {
    pub import_file_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailFileParse {
    pub import_file_id: Uuid,
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddFileDataRow {
    pub import_file_id: Uuid,
    pub file_data_row_id: Uuid,
    pub date: DateTime<Utc>,
    pub description: String,
    /// Signed amount as printed on the statement
    pub amount: Money,
    #[serde(default)]
    pub raw_data: RawRowData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyFileDataRow {
    pub import_file_id: Uuid,
    pub file_data_row_id: Uuid,
    #[serde(default)]
    pub movement_type_id: Option<Uuid>,
    #[serde(default)]
    pub source_account_id: Option<Uuid>,
    pub description: String,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidateFileDataRow {
    pub import_file_id: Uuid,
    pub file_data_row_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterAccountMovementIdForVerifiedFileDataRow {
    pub import_file_id: Uuid,
    pub file_data_row_id: Uuid,
    pub account_movement_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportFileCommand {
    RegisterNewImportFile(RegisterNewImportFile),
    StartFileParse(FileParseTransition),
    RestartFileParse(FileParseTransition),
    EndFileParse(FileParseTransition),
    FailFileParse(FailFileParse),
    AddFileDataRow(AddFileDataRow),
    VerifyFileDataRow(VerifyFileDataRow),
    InvalidateFileDataRow(InvalidateFileDataRow),
    RegisterAccountMovementIdForVerifiedFileDataRow(RegisterAccountMovementIdForVerifiedFileDataRow),
}

impl AggregateCommand for ImportFileCommand {
    fn command_type(&self) -> &'static str {
        match self {
            ImportFileCommand::RegisterNewImportFile(_) => REGISTER_NEW_IMPORT_FILE,
            ImportFileCommand::StartFileParse(_) => START_FILE_PARSE,
            ImportFileCommand::RestartFileParse(_) => RESTART_FILE_PARSE,
            ImportFileCommand::EndFileParse(_) => END_FILE_PARSE,
            ImportFileCommand::FailFileParse(_) => FAIL_FILE_PARSE,
            ImportFileCommand::AddFileDataRow(_) => ADD_FILE_DATA_ROW,
            ImportFileCommand::VerifyFileDataRow(_) => VERIFY_FILE_DATA_ROW,
            ImportFileCommand::InvalidateFileDataRow(_) => INVALIDATE_FILE_DATA_ROW,
            ImportFileCommand::RegisterAccountMovementIdForVerifiedFileDataRow(_) => {
                REGISTER_ACCOUNT_MOVEMENT_ID_FOR_VERIFIED_FILE_DATA_ROW
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        match self {
            ImportFileCommand::RegisterNewImportFile(command) => command.import_file_id,
            ImportFileCommand::StartFileParse(command)
            | ImportFileCommand::RestartFileParse(command)
            | ImportFileCommand::EndFileParse(command) => command.import_file_id,
            ImportFileCommand::FailFileParse(command) => command.import_file_id,
            ImportFileCommand::AddFileDataRow(command) => command.import_file_id,
            ImportFileCommand::VerifyFileDataRow(command) => command.import_file_id,
            ImportFileCommand::InvalidateFileDataRow(command) => command.import_file_id,
            ImportFileCommand::RegisterAccountMovementIdForVerifiedFileDataRow(command) => {
                command.import_file_id
            }
        }
    }

    fn is_registration(&self) -> bool {
        matches!(self, ImportFileCommand::RegisterNewImportFile(_))
    }
}

// =========================================================================
// State
// =========================================================================

/// Parse state of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Imported,
    ParsingStarted,
    ParsingRestarted,
    ParsingEnded,
    ParsingFailed,
}

impl FileState {
    fn is_parsing(&self) -> bool {
        matches!(self, FileState::ParsingStarted | FileState::ParsingRestarted)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            FileState::Imported => "imported",
            FileState::ParsingStarted => "parsingStarted",
            FileState::ParsingRestarted => "parsingRestarted",
            FileState::ParsingEnded => "parsingEnded",
            FileState::ParsingFailed => "parsingFailed",
        };
        f.write_str(state)
    }
}

/// Review state of an imported row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRowState {
    Unverified,
    Verified,
    Invalid,
}

impl fmt::Display for DataRowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            DataRowState::Unverified => "unverified",
            DataRowState::Verified => "verified",
            DataRowState::Invalid => "invalid",
        };
        f.write_str(state)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub state: DataRowState,
    pub date: DateTime<Utc>,
    pub amount: Money,
    pub description: String,
    pub movement_type_id: Option<Uuid>,
    pub source_account_id: Option<Uuid>,
    pub tag_ids: Vec<Uuid>,
    /// Ledger movement created for the row once verified
    pub account_movement_id: Option<Uuid>,
}

// =========================================================================
// Aggregate
// =========================================================================

#[derive(Debug, Clone)]
pub struct ImportFile {
    id: Uuid,
    account_id: Uuid,
    filename: String,
    state: FileState,
    rows: BTreeMap<Uuid, DataRow>,
    version: i64,
}

impl ImportFile {
    pub fn account_id(&self) -> Uuid {
        self.account_id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn state(&self) -> FileState {
        self.state
    }

    pub fn row(&self, data_row_id: Uuid) -> Option<&DataRow> {
        self.rows.get(&data_row_id)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&Uuid, &DataRow)> {
        self.rows.iter()
    }

    fn require_state(
        &self,
        operation: &'static str,
        allowed: impl Fn(FileState) -> bool,
    ) -> Result<(), DomainError> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(DomainError::InvalidFileState {
                id: self.id,
                operation,
                state: self.state.to_string(),
            })
        }
    }

    /// Look up a row that must be in `expected` state
    fn require_row(
        &self,
        operation: &'static str,
        data_row_id: Uuid,
        expected: DataRowState,
    ) -> Result<&DataRow, DomainError> {
        match self.rows.get(&data_row_id) {
            Some(row) if row.state == expected => Ok(row),
            found => Err(DomainError::DataRowStateMismatch {
                id: self.id,
                operation,
                data_row_id,
                exists: found.is_some(),
                state: found.map(|row| row.state.to_string()).unwrap_or_default(),
            }),
        }
    }

    fn transition(&self, command: &ImportFileCommand) -> Result<ImportFileEvent, DomainError> {
        let event = match command {
            ImportFileCommand::RegisterNewImportFile(command) => {
                ImportFileEvent::NewImportFileRegistered(NewImportFileRegisteredData {
                    import_file_id: command.import_file_id,
                    account_id: command.account_id,
                    filename: command.filename.clone(),
                    file_type: command.file_type,
                })
            }

            ImportFileCommand::StartFileParse(command) => {
                self.require_state("StartFileParse", |state| state == FileState::Imported)?;
                ImportFileEvent::FileParseStarted(FileParseTransitionData {
                    import_file_id: command.import_file_id,
                })
            }

            ImportFileCommand::RestartFileParse(command) => {
                self.require_state("RestartFileParse", |state| {
                    state == FileState::ParsingFailed
                })?;
                ImportFileEvent::FileParseRestarted(FileParseTransitionData {
                    import_file_id: command.import_file_id,
                })
            }

            ImportFileCommand::EndFileParse(command) => {
                self.require_state("EndFileParse", |state| state.is_parsing())?;
                ImportFileEvent::FileParseEnded(FileParseTransitionData {
                    import_file_id: command.import_file_id,
                })
            }

            ImportFileCommand::FailFileParse(command) => {
                self.require_state("FailFileParse", |state| state.is_parsing())?;
                ImportFileEvent::FileParseFailed(FileParseFailedData {
                    import_file_id: command.import_file_id,
                    code: command.code.clone(),
                    reason: command.reason.clone(),
                })
            }

            ImportFileCommand::AddFileDataRow(command) => {
                self.require_state("AddFileDataRow", |state| state == FileState::ParsingEnded)?;

                if self.rows.contains_key(&command.file_data_row_id) {
                    return Err(DomainError::DuplicateDataRow {
                        id: self.id,
                        data_row_id: command.file_data_row_id,
                    });
                }

                ImportFileEvent::FileDataRowAdded(FileDataRowAddedData {
                    import_file_id: command.import_file_id,
                    file_data_row_id: command.file_data_row_id,
                    date: command.date,
                    description: command.description.clone(),
                    amount: command.amount,
                    raw_data: command.raw_data.clone(),
                })
            }

            ImportFileCommand::VerifyFileDataRow(command) => {
                self.require_state("VerifyFileDataRow", |state| {
                    state == FileState::ParsingEnded
                })?;
                self.require_row(
                    "verification",
                    command.file_data_row_id,
                    DataRowState::Unverified,
                )?;

                ImportFileEvent::FileDataRowMarkedAsVerified(FileDataRowMarkedAsVerifiedData {
                    import_file_id: command.import_file_id,
                    file_data_row_id: command.file_data_row_id,
                    description: command.description.clone(),
                    movement_type_id: command.movement_type_id,
                    source_account_id: command.source_account_id,
                    tag_ids: command.tag_ids.clone(),
                })
            }

            ImportFileCommand::InvalidateFileDataRow(command) => {
                self.require_state("InvalidateFileDataRow", |state| {
                    state == FileState::ParsingEnded
                })?;
                self.require_row(
                    "invalidation",
                    command.file_data_row_id,
                    DataRowState::Unverified,
                )?;

                ImportFileEvent::FileDataRowMarkedAsInvalid(FileDataRowMarkedAsInvalidData {
                    import_file_id: command.import_file_id,
                    file_data_row_id: command.file_data_row_id,
                    reason: command.reason.clone(),
                })
            }

            ImportFileCommand::RegisterAccountMovementIdForVerifiedFileDataRow(command) => {
                self.require_state("RegisterAccountMovementIdForVerifiedFileDataRow", |state| {
                    state == FileState::ParsingEnded
                })?;
                let row = self.require_row(
                    "verification account movement",
                    command.file_data_row_id,
                    DataRowState::Verified,
                )?;

                if let Some(existing) = row.account_movement_id {
                    return Err(DomainError::DuplicateAccountMovement {
                        id: self.id,
                        movement_id: existing,
                    });
                }

                ImportFileEvent::AccountMovementIdForVerifiedFileDataRowRegistered(
                    AccountMovementIdRegisteredData {
                        import_file_id: command.import_file_id,
                        file_data_row_id: command.file_data_row_id,
                        account_movement_id: command.account_movement_id,
                    },
                )
            }
        };

        Ok(event)
    }
}

impl Aggregate for ImportFile {
    type Command = ImportFileCommand;
    type Event = ImportFileEvent;

    fn aggregate_type() -> &'static str {
        AGGREGATE_TYPE
    }

    fn label() -> &'static str {
        "importfile"
    }

    fn new(id: Uuid) -> Self {
        Self {
            id,
            account_id: Uuid::nil(),
            filename: String::new(),
            state: FileState::Imported,
            rows: BTreeMap::new(),
            version: 0,
        }
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn handle(&self, command: &ImportFileCommand) -> Result<Vec<ImportFileEvent>, DomainError> {
        self.transition(command).map(|event| vec![event])
    }

    fn apply(mut self, event: &Event<ImportFileEvent>) -> Self {
        match &event.data {
            ImportFileEvent::NewImportFileRegistered(data) => {
                self.account_id = data.account_id;
                self.filename = data.filename.clone();
                self.state = FileState::Imported;
                self.rows.clear();
            }
            ImportFileEvent::FileParseStarted(_) => self.state = FileState::ParsingStarted,
            ImportFileEvent::FileParseRestarted(_) => self.state = FileState::ParsingRestarted,
            ImportFileEvent::FileParseEnded(_) => self.state = FileState::ParsingEnded,
            ImportFileEvent::FileParseFailed(_) => self.state = FileState::ParsingFailed,

            ImportFileEvent::FileDataRowAdded(data) => {
                self.rows.insert(
                    data.file_data_row_id,
                    DataRow {
                        state: DataRowState::Unverified,
                        date: data.date,
                        amount: data.amount,
                        description: data.description.clone(),
                        movement_type_id: None,
                        source_account_id: None,
                        tag_ids: Vec::new(),
                        account_movement_id: None,
                    },
                );
            }

            ImportFileEvent::FileDataRowMarkedAsVerified(data) => {
                if let Some(row) = self.rows.get_mut(&data.file_data_row_id) {
                    row.state = DataRowState::Verified;
                    row.description = data.description.clone();
                    row.movement_type_id = data.movement_type_id;
                    row.source_account_id = data.source_account_id;
                    row.tag_ids = data.tag_ids.clone();
                }
            }

            ImportFileEvent::FileDataRowMarkedAsInvalid(data) => {
                if let Some(row) = self.rows.get_mut(&data.file_data_row_id) {
                    row.state = DataRowState::Invalid;
                }
            }

            ImportFileEvent::AccountMovementIdForVerifiedFileDataRowRegistered(data) => {
                if let Some(row) = self.rows.get_mut(&data.file_data_row_id) {
                    row.account_movement_id = Some(data.account_movement_id);
                }
            }
        }

        self.version += 1;
        self
    }
}

// =========================================================================
// Registry
// =========================================================================

pub fn register_events(builder: TypeRegistryBuilder) -> TypeRegistryBuilder {
    builder
        .event(NEW_IMPORT_FILE_REGISTERED, |bytes| {
            Ok(ImportFileEvent::NewImportFileRegistered(serde_json::from_slice(bytes)?).into())
        })
        .event(FILE_PARSE_STARTED, |bytes| {
            Ok(ImportFileEvent::FileParseStarted(serde_json::from_slice(bytes)?).into())
        })
        .event(FILE_PARSE_RESTARTED, |bytes| {
            Ok(ImportFileEvent::FileParseRestarted(serde_json::from_slice(bytes)?).into())
        })
        .event(FILE_PARSE_ENDED, |bytes| {
            Ok(ImportFileEvent::FileParseEnded(serde_json::from_slice(bytes)?).into())
        })
        .event(FILE_PARSE_FAILED, |bytes| {
            Ok(ImportFileEvent::FileParseFailed(serde_json::from_slice(bytes)?).into())
        })
        .event(FILE_DATA_ROW_ADDED, |bytes| {
            Ok(ImportFileEvent::FileDataRowAdded(serde_json::from_slice(bytes)?).into())
        })
        .event(FILE_DATA_ROW_MARKED_AS_VERIFIED, |bytes| {
            Ok(ImportFileEvent::FileDataRowMarkedAsVerified(serde_json::from_slice(bytes)?).into())
        })
        .event(FILE_DATA_ROW_MARKED_AS_INVALID, |bytes| {
            Ok(ImportFileEvent::FileDataRowMarkedAsInvalid(serde_json::from_slice(bytes)?).into())
        })
        .event(ACCOUNT_MOVEMENT_ID_FOR_VERIFIED_FILE_DATA_ROW_REGISTERED, |bytes| {
            Ok(ImportFileEvent::AccountMovementIdForVerifiedFileDataRowRegistered(
                serde_json::from_slice(bytes)?,
            )
            .into())
        })
}

pub fn register_commands(builder: TypeRegistryBuilder) -> TypeRegistryBuilder {
    builder
        .command(REGISTER_NEW_IMPORT_FILE, |bytes| {
            Ok(ImportFileCommand::RegisterNewImportFile(serde_json::from_slice(bytes)?).into())
        })
        .command(START_FILE_PARSE, |bytes| {
            Ok(ImportFileCommand::StartFileParse(serde_json::from_slice(bytes)?).into())
        })
        .command(RESTART_FILE_PARSE, |bytes| {
            Ok(ImportFileCommand::RestartFileParse(serde_json::from_slice(bytes)?).into())
        })
        .command(END_FILE_PARSE, |bytes| {
            Ok(ImportFileCommand::EndFileParse(serde_json::from_slice(bytes)?).into())
        })
        .command(FAIL_FILE_PARSE, |bytes| {
            Ok(ImportFileCommand::FailFileParse(serde_json::from_slice(bytes)?).into())
        })
        .command(ADD_FILE_DATA_ROW, |bytes| {
            Ok(ImportFileCommand::AddFileDataRow(serde_json::from_slice(bytes)?).into())
        })
        .command(VERIFY_FILE_DATA_ROW, |bytes| {
            Ok(ImportFileCommand::VerifyFileDataRow(serde_json::from_slice(bytes)?).into())
        })
        .command(INVALIDATE_FILE_DATA_ROW, |bytes| {
            Ok(ImportFileCommand::InvalidateFileDataRow(serde_json::from_slice(bytes)?).into())
        })
        .command(REGISTER_ACCOUNT_MOVEMENT_ID_FOR_VERIFIED_FILE_DATA_ROW, |bytes| {
            Ok(ImportFileCommand::RegisterAccountMovementIdForVerifiedFileDataRow(
                serde_json::from_slice(bytes)?,
            )
            .into())
        })
}
