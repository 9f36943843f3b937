mod api_tests;
mod loan_lifecycle;
