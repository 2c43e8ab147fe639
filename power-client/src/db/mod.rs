pub mod power_data_queries;
