//! Tower Layer implementation for token authentication

use std::sync::Arc;

use tower::Layer;

use crate::bridge::AuthenticationBridge;

use super::service::TokenAuthService;

/// Tower Layer that authenticates requests from their token
///
/// # Example
///
/// ```rust,ignore
/// use tower::ServiceBuilder;
/// use tokenweave::tower::TokenAuthLayer;
///
/// let service = ServiceBuilder::new()
///     .layer(TokenAuthLayer::new(bridge))
///     .service(my_inner_service);
/// ```
#[derive(Debug)]
pub struct TokenAuthLayer<P> {
    bridge: Arc<AuthenticationBridge<P>>,
}

impl<P> Clone for TokenAuthLayer<P> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
        }
    }
}

impl<P> TokenAuthLayer<P> {
    /// Create a layer around `bridge`
    pub fn new(bridge: AuthenticationBridge<P>) -> Self {
        Self::from_arc(Arc::new(bridge))
    }

    /// Create a layer from an Arc'd bridge
    pub fn from_arc(bridge: Arc<AuthenticationBridge<P>>) -> Self {
        Self { bridge }
    }
}

impl<S, P> Layer<S> for TokenAuthLayer<P> {
    type Service = TokenAuthService<S, P>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenAuthService::new(inner, Arc::clone(&self.bridge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenweave_auth::TokenSettings;

    #[test]
    fn test_layer_shares_bridge() {
        let bridge = AuthenticationBridge::for_users(&TokenSettings::with_secret("s3cr3t")).unwrap();
        let layer = TokenAuthLayer::new(bridge);
        let copy = layer.clone();
        assert!(Arc::ptr_eq(&layer.bridge, &copy.bridge));
    }
}
