//! Pattern compilation and the leaf-level sanitizers.
//!
//! This module compiles configured patterns into efficient regular expressions and
//! applies them to single strings and mapping keys. The recursive traversal that
//! calls into it lives in `engines`; nothing here looks at more than one string
//! at a time.

pub mod compiler;
pub mod key_policy;
pub mod string;
