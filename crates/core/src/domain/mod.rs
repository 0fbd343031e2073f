pub mod catalog;
pub mod fragment;
pub mod intent;
pub mod query;
pub mod scope;
