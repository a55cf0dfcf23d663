pub mod assessment;
pub mod audit_log;
pub mod category;
pub mod category_session;
pub mod draft;
pub mod feedback;
pub mod interview;
pub mod practice_attempt;
pub mod problem;
pub mod question;
pub mod review;
pub mod user;
