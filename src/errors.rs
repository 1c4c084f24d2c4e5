use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickerError {
    /// 缓冲队列已满，事件被拒绝（fail fast，不会静默丢弃）
    Backpressure(String),
    /// 统计查询区间非法（from >= to）
    InvalidRange(String),
    /// 存储后端连接 / 事务失败，或调用超时
    StorageUnavailable(String),
    /// 计数器存储的批量写入部分失败
    PartialBatchFailure(String),
    /// 服务已关闭，缓冲区不再接收事件
    ServiceStopped(String),
    Configuration(String),
    Validation(String),
}

impl ClickerError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ClickerError::Backpressure(_) => "E001",
            ClickerError::InvalidRange(_) => "E002",
            ClickerError::StorageUnavailable(_) => "E003",
            ClickerError::PartialBatchFailure(_) => "E004",
            ClickerError::ServiceStopped(_) => "E005",
            ClickerError::Configuration(_) => "E006",
            ClickerError::Validation(_) => "E007",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ClickerError::Backpressure(_) => "Backpressure",
            ClickerError::InvalidRange(_) => "Invalid Range",
            ClickerError::StorageUnavailable(_) => "Storage Unavailable",
            ClickerError::PartialBatchFailure(_) => "Partial Batch Failure",
            ClickerError::ServiceStopped(_) => "Service Stopped",
            ClickerError::Configuration(_) => "Configuration Error",
            ClickerError::Validation(_) => "Validation Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ClickerError::Backpressure(msg)
            | ClickerError::InvalidRange(msg)
            | ClickerError::StorageUnavailable(msg)
            | ClickerError::PartialBatchFailure(msg)
            | ClickerError::ServiceStopped(msg)
            | ClickerError::Configuration(msg)
            | ClickerError::Validation(msg) => msg,
        }
    }

    /// 是否由存储后端引起（调用方可据此决定是否重试）
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            ClickerError::StorageUnavailable(_) | ClickerError::PartialBatchFailure(_)
        )
    }

    /// 格式化为彩色输出（用于 CLI 错误输出）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for ClickerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ClickerError {}

// 便捷的构造函数
impl ClickerError {
    pub fn backpressure<T: Into<String>>(msg: T) -> Self {
        ClickerError::Backpressure(msg.into())
    }

    pub fn invalid_range<T: Into<String>>(msg: T) -> Self {
        ClickerError::InvalidRange(msg.into())
    }

    pub fn storage_unavailable<T: Into<String>>(msg: T) -> Self {
        ClickerError::StorageUnavailable(msg.into())
    }

    pub fn partial_batch_failure<T: Into<String>>(msg: T) -> Self {
        ClickerError::PartialBatchFailure(msg.into())
    }

    pub fn service_stopped<T: Into<String>>(msg: T) -> Self {
        ClickerError::ServiceStopped(msg.into())
    }

    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        ClickerError::Configuration(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ClickerError::Validation(msg.into())
    }
}

impl From<sea_orm::DbErr> for ClickerError {
    fn from(err: sea_orm::DbErr) -> Self {
        ClickerError::StorageUnavailable(err.to_string())
    }
}

impl From<redis::RedisError> for ClickerError {
    fn from(err: redis::RedisError) -> Self {
        ClickerError::StorageUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClickerError>;
