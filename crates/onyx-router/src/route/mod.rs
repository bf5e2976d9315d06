/// Route module for file-based routing
///
/// `pattern` compiles route patterns into anchored matchers, `node` turns
/// discovered files into classified routes.
pub mod node;
pub mod pattern;

pub use node::{
    attach_layouts, classify_file, compare_specificity, Classified, Layout, RouteExports,
    RouteFile, RouteKind, RouteNode,
};
pub use pattern::{classify_segment, compile_pattern, CompiledPattern, Params, PatternError, Segment};
