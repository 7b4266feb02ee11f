pub mod router;

pub use router::{Lookup, Param, Params, RouteInfo, RouteMatch, Router, MAX_INLINE_PARAMS};
