mod middleware_tests;
mod startup_tests;
