//! Platform interaction: REST client, call detectors, browser automation and
//! the two seat drivers built on top of them.

pub mod api_driver;
pub mod browser;
pub mod browser_driver;
pub mod detector;
pub mod platform_client;
pub mod transport;

pub use api_driver::ApiDriver;
pub use browser::{BrowserPage, DevToolsPage};
pub use browser_driver::BrowserDriver;
pub use detector::{BrowserStateDetector, CallDetector, LiveCallState, PollingDetector};
pub use platform_client::{PlatformClient, PollOutcome};
pub use transport::{HttpBody, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
