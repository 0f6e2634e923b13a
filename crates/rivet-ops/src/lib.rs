pub mod ops_restore;
pub mod ops_runtimes;
pub mod ops_tree;
pub mod project;
