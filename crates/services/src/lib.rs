#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod exam_authoring_service;
pub mod exam_service;
pub mod invalidation;
pub mod player;
pub mod progress_service;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use config::{AppConfig, ConfigError};
pub use error::{
    AppServicesError, ExamAuthoringError, ExamSessionError, PlayerError, ProgressError,
};
pub use exam_authoring_service::{AuthoringMode, ExamAuthoringService};
pub use exam_service::{ExamAttempt, ExamService};
pub use invalidation::{CacheKey, InvalidationBus};
pub use player::CoursePlayer;
pub use progress_service::ProgressService;
