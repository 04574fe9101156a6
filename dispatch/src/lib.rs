// Sports Oracle Dispatch
// Routes prediction requests to per-sport agents and composes the answer

pub mod agent;
pub mod config;
pub mod dispatcher;
pub mod parlay;
pub mod registry;
pub mod remote;
pub mod routing;

pub use agent::{local_instance_id, InProcessAgent, Predictor, RemoteProxy, SportAgent};
pub use config::{
    create_config_template, load_config, save_config, AgentSpec, DispatchConfig, OracleConfig,
};
pub use dispatcher::{HeadDispatcher, HeadDispatcherBuilder};
pub use parlay::ParlayComposer;
pub use registry::AgentRegistry;
pub use remote::{RemoteInvoker, RemotePredictRequest};
pub use routing::{detect_sports, requested_sports};
