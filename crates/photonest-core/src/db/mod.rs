//! Local cache database for PhotoNest

mod cache;
mod category_dao;
mod comment_dao;
mod connection;
mod migrations;
mod notification_dao;
mod post_dao;
mod row;
mod user_dao;

pub use cache::LocalCache;
pub use category_dao::CategoryDao;
pub use comment_dao::CommentDao;
pub use connection::Database;
pub use notification_dao::NotificationDao;
pub use post_dao::PostDao;
pub use user_dao::UserDao;
