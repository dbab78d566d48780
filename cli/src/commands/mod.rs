pub mod recover;
pub mod respond;
pub mod watch;
