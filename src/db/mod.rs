pub mod admin;
pub mod contact;
pub mod models;
pub mod notifications;
pub mod projects;
pub mod users;

pub use admin::AdminService;
pub use contact::ContactService;
pub use notifications::NotificationService;
pub use projects::ProjectService;
pub use users::UserService;
