pub mod decision;
pub mod facts;
pub mod flow;
