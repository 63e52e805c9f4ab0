//! REST resources bound in one call
//!
//! A resource answers GET, POST, PUT and DELETE on `/<root_url>`. Methods
//! it does not override answer 405.

use crate::error::{Error, HandlerResult};
use crate::http::{Request, ResponseWriter};

pub trait Resource: Send + Sync + 'static {
    /// Path under which the resource is mounted, without leading slash
    fn root_url(&self) -> &str;

    fn get(&self, _w: &mut ResponseWriter, _r: &mut Request) -> HandlerResult {
        Err(Error::method_not_allowed(""))
    }

    fn post(&self, _w: &mut ResponseWriter, _r: &mut Request) -> HandlerResult {
        Err(Error::method_not_allowed(""))
    }

    fn put(&self, _w: &mut ResponseWriter, _r: &mut Request) -> HandlerResult {
        Err(Error::method_not_allowed(""))
    }

    fn delete(&self, _w: &mut ResponseWriter, _r: &mut Request) -> HandlerResult {
        Err(Error::method_not_allowed(""))
    }
}
