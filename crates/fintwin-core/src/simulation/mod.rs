pub mod monte_carlo;
pub mod projection;
pub mod sampling;
pub mod stress;
pub mod what_if;

pub use monte_carlo::{
    run_monte_carlo, run_monte_carlo_with_rng, MonteCarloInput, MonteCarloResult, MonthPercentiles,
    SimulationConfig, CREDIT_FLOOR, DEFAULT_CONSECUTIVE_MONTHS,
};
pub use projection::{project, MonthlyProjection, ProjectionInput, MAX_HORIZON_MONTHS};
pub use stress::{run_stress_test, StressScenario, StressTestInput, StressTestResult};
pub use what_if::{simulate_what_if, WhatIfInput, WhatIfMonth, WhatIfResult, WhatIfScenario, WhatIfStress};
