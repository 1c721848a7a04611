/// The operation a statement is composed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistenceAction {
    Get,
    Query,
    Count,
    Add,
    Update,
    Remove,
}

impl PersistenceAction {
    pub fn is_read(self) -> bool {
        matches!(
            self,
            PersistenceAction::Get | PersistenceAction::Query | PersistenceAction::Count
        )
    }

    /// Query and Count accept partial text matches and OR-joined terms.
    pub fn is_search(self) -> bool {
        matches!(self, PersistenceAction::Query | PersistenceAction::Count)
    }
}

/// Relational back-end a statement targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DatabaseEngine {
    MySql,
    SqlServer,
    PostgreSql,
    #[default]
    Sqlite,
}

impl DatabaseEngine {
    /// Bound-parameter placeholder for the 1-based `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            DatabaseEngine::PostgreSql => format!("${index}"),
            DatabaseEngine::SqlServer => format!("@p{index}"),
            DatabaseEngine::MySql | DatabaseEngine::Sqlite => "?".to_string(),
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "mysql" => Some(DatabaseEngine::MySql),
            "sqlserver" | "mssql" => Some(DatabaseEngine::SqlServer),
            "postgresql" | "postgres" => Some(DatabaseEngine::PostgreSql),
            "sqlite" => Some(DatabaseEngine::Sqlite),
            _ => None,
        }
    }
}

/// How formatted values reach the statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BindMode {
    /// Values are rendered as SQL literals inside the text.
    #[default]
    Inline,
    /// Values are carried as parameters behind dialect placeholders.
    Bound,
}

impl BindMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "inline" => Some(BindMode::Inline),
            "bound" => Some(BindMode::Bound),
            _ => None,
        }
    }
}

/// Options steering statement composition.
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    pub engine: DatabaseEngine,
    pub binding: BindMode,
    /// Maximum number of rows; `0` means unlimited.
    pub limit: usize,
    /// Join predicate terms with AND instead of OR on Query/Count.
    pub conjunction: bool,
    pub only_listable: bool,
    pub show_attributes: Vec<String>,
    pub group_attributes: Vec<String>,
    pub order_attributes: Vec<String>,
    pub order_descending: bool,
    /// Add a dirty-read lock hint (SQL Server only).
    pub read_uncommitted: bool,
}

impl ComposeOptions {
    pub fn new(engine: DatabaseEngine) -> Self {
        Self {
            engine,
            ..Self::default()
        }
    }

    pub fn binding(mut self, binding: BindMode) -> Self {
        self.binding = binding;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn conjunction(mut self, conjunction: bool) -> Self {
        self.conjunction = conjunction;
        self
    }

    /// Restrict the projection to listable columns, optionally narrowed to
    /// `attributes`.
    pub fn only_listable(mut self, attributes: &[&str]) -> Self {
        self.only_listable = true;
        self.show_attributes = attributes.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn group_by(mut self, attributes: &[&str]) -> Self {
        self.group_attributes = attributes.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn order_by(mut self, attributes: &[&str], descending: bool) -> Self {
        self.order_attributes = attributes.iter().map(|a| a.to_string()).collect();
        self.order_descending = descending;
        self
    }

    pub fn read_uncommitted(mut self, read_uncommitted: bool) -> Self {
        self.read_uncommitted = read_uncommitted;
        self
    }

    /// Same engine, binding and lock hint; no paging, projection or sorting.
    /// Used for the secondary lookups of composition.
    pub fn plain(&self) -> Self {
        Self {
            engine: self.engine,
            binding: self.binding,
            read_uncommitted: self.read_uncommitted,
            ..Self::default()
        }
    }
}
