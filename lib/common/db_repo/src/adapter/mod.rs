pub mod mem_repo;
pub mod mysql_db_repo;
