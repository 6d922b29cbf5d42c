pub mod alert_engine;
pub mod dispatcher;
pub mod poll_loop;
