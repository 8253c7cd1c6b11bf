//! Presentation of the session: HTML markup and terminal frames.

pub mod markup;
pub mod terminal;
