pub mod battery;
pub mod cache;
pub mod codec;
pub mod context;
pub mod deadline;
pub mod error;
pub mod fitness;
pub mod flow;
pub mod forecast;
pub mod genetic;
pub mod mode;
pub mod optimizer;
pub mod period;
pub mod pool;
pub mod population;
pub mod simulator;
pub mod solution;
