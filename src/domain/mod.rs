//! Domain types shared by the classifier, the session state, and the pipeline.

pub mod segment;
pub mod selection;
pub mod vocabulary;
