pub mod reader_pool;
