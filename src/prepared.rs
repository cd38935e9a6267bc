use crate::protocol::command::FieldDefinition;
use crate::protocol::command::prepared::PrepareOk;

/// A statement prepared on the server
///
/// Owned by the caller. The connection only needs [`PreparedStatement::id`] to reset
/// or close it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    id: u32,
    num_params: u16,
    num_columns: u16,
    warning_count: u16,
    params: Vec<FieldDefinition>,
    columns: Vec<FieldDefinition>,
}

impl PreparedStatement {
    pub(crate) fn new(header: &PrepareOk) -> Self {
        Self {
            id: header.statement_id(),
            num_params: header.num_params(),
            num_columns: header.num_columns(),
            warning_count: header.warning_count(),
            params: Vec::with_capacity(usize::from(header.num_params())),
            columns: Vec::with_capacity(usize::from(header.num_columns())),
        }
    }

    /// Append the next field definition: parameters first, then columns
    ///
    /// Returns the field back if both lists are already full.
    pub(crate) fn push_field(
        &mut self,
        field: FieldDefinition,
    ) -> std::result::Result<(), FieldDefinition> {
        if self.params.len() < usize::from(self.num_params) {
            self.params.push(field);
            Ok(())
        } else if self.columns.len() < usize::from(self.num_columns) {
            self.columns.push(field);
            Ok(())
        } else {
            Err(field)
        }
    }

    /// Whether every declared parameter and column definition has arrived
    pub(crate) fn is_filled(&self) -> bool {
        self.params.len() == usize::from(self.num_params)
            && self.columns.len() == usize::from(self.num_columns)
    }

    /// The server-assigned statement handle
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn num_params(&self) -> u16 {
        self.num_params
    }

    pub fn num_columns(&self) -> u16 {
        self.num_columns
    }

    /// Number of warnings the server reported while preparing
    pub fn warning_count(&self) -> u16 {
        self.warning_count
    }

    pub fn params(&self) -> &[FieldDefinition] {
        &self.params
    }

    pub fn columns(&self) -> &[FieldDefinition] {
        &self.columns
    }

    pub fn into_fields(self) -> (Vec<FieldDefinition>, Vec<FieldDefinition>) {
        (self.params, self.columns)
    }
}
