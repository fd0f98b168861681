pub mod conflicting_db;
pub mod mock_gateway;
pub mod prepare_env;
pub mod seed;

pub use conflicting_db::ConflictingDb;
pub use mock_gateway::MockGateway;
pub use prepare_env::{prepare_test_env, random_db_path};
pub use seed::{seed_actors, seed_trip, CUSTOMER_ID, DRIVER_ID, SECOND_DRIVER_ID, TRUCK_ID};
