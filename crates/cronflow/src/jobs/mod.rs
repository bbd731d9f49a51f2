pub mod cron;
pub mod memory;
pub mod model;
pub mod notifier;
pub mod payloads;
pub mod queue;
pub mod registry;
pub mod repo;
pub mod runner;
pub mod scheduler;
pub mod store;

pub use cron::{next_fire_time, CronError, CronSchedule};
pub use memory::MemoryStore;
pub use model::{Job, JobStatus, JobType, NewRecurringJob, RecurringJob};
pub use notifier::Notifier;
pub use payloads::{EmailPayload, PrintPayload};
pub use queue::{JobQueue, QueueConfig, RunningQueue};
pub use registry::{boxed, parse_payload, BoxFuture, HandlerRegistry, JobError};
pub use repo::JobsRepo;
pub use store::JobStore;
