//! Service configuration loaded from environment variables.

/// Settings for the allocation service's outbound collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationConfig {
    /// SMTP relay used for notifications.
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Sender address of notification emails.
    pub sender: String,
    /// Recipient of out-of-stock notifications.
    pub out_of_stock_recipient: String,
}

impl AllocationConfig {
    /// Loads configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            smtp_host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(587),
            sender: std::env::var("NOTIFICATION_SENDER")
                .unwrap_or_else(|_| "allocations@example.com".to_string()),
            out_of_stock_recipient: std::env::var("OUT_OF_STOCK_RECIPIENT")
                .unwrap_or_else(|_| "stock@example.com".to_string()),
        }
    }
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            sender: "allocations@example.com".to_string(),
            out_of_stock_recipient: "stock@example.com".to_string(),
        }
    }
}
