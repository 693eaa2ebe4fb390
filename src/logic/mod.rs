pub mod engine;
pub mod equilibrium;
pub mod gates;
pub mod intelligent;
pub mod schedule;
pub mod weather;

pub use schedule::ScheduleAggregator;
pub use weather::WeatherProvider;
