use tracing::{debug, error, info, warn};

/// Context information for log messages
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Component name (e.g., "coordinator", "kraken", "offpeak")
    pub component: String,
    /// Account the messages relate to
    pub account_number: Option<String>,
    /// Identifier of the refresh cycle in flight
    pub cycle_id: Option<String>,
    /// Additional context fields
    pub extra_fields: std::collections::BTreeMap<String, String>,
}

impl LogContext {
    /// Create a new log context
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            account_number: None,
            cycle_id: None,
            extra_fields: std::collections::BTreeMap::new(),
        }
    }

    /// Set account number
    pub fn with_account_number(mut self, account_number: &str) -> Self {
        self.account_number = Some(account_number.to_string());
        self
    }

    /// Set refresh cycle id
    pub fn with_cycle_id(mut self, cycle_id: String) -> Self {
        self.cycle_id = Some(cycle_id);
        self
    }

    /// Add extra field
    pub fn with_field(mut self, key: &str, value: String) -> Self {
        self.extra_fields.insert(key.to_string(), value);
        self
    }
}

/// Structured logger with context
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    pub(crate) context: LogContext,
}

impl StructuredLogger {
    /// Create a new structured logger with context
    pub fn new(context: LogContext) -> Self {
        Self { context }
    }

    /// Derive a logger tagged with a fresh refresh cycle id
    pub fn for_cycle(&self, cycle_id: String) -> Self {
        Self::new(self.context.clone().with_cycle_id(cycle_id))
    }

    pub fn context(&self) -> &LogContext {
        &self.context
    }

    pub fn info(&self, message: &str) {
        let fields = self.format_fields();
        info!(%fields, "{}", message);
    }
    pub fn warn(&self, message: &str) {
        let fields = self.format_fields();
        warn!(%fields, "{}", message);
    }
    pub fn error(&self, message: &str) {
        let fields = self.format_fields();
        error!(%fields, "{}", message);
    }
    pub fn debug(&self, message: &str) {
        let fields = self.format_fields();
        debug!(%fields, "{}", message);
    }

    /// Format context fields for logging
    fn format_fields(&self) -> String {
        let mut fields = vec![format!("component={}", self.context.component)];
        if let Some(ref account) = self.context.account_number {
            fields.push(format!("account={}", account));
        }
        if let Some(ref cycle_id) = self.context.cycle_id {
            fields.push(format!("cycle={}", cycle_id));
        }
        for (key, value) in &self.context.extra_fields {
            fields.push(format!("{}={}", key, value));
        }
        fields.join(",")
    }
}

/// Create a logger for a specific component
pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}
/// Create a logger with full context
pub fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}
