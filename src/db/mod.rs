pub mod chatdb;
pub mod db;
pub mod jobdb;
pub mod live;
pub mod notificationdb;
pub mod userdb;
