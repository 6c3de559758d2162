//! Infrastructure layer: storage backends, OTP delivery, image files, seeding.

pub mod memory;
pub mod notify;
pub mod postgres;
pub mod seed;
pub mod store;
pub mod uploads;

pub use memory::InMemoryStore;
pub use notify::{
    FallbackSender, LogSender, MemorySender, NotifyError, OtpSender, PostmarkSender, RapidApiSender, SharedSender,
    SmtpSender, SmtpSettings,
};
pub use postgres::PostgresStore;
pub use store::{SharedStore, Store, StoreError, StoreResult};
pub use uploads::{ImageStore, UploadError};
