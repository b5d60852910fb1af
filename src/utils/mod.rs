use std::path::PathBuf;

pub fn get_app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("KETANG_DATA_DIR") {
        return PathBuf::from(dir);
    }
    match std::env::var_os("HOME") {
        Some(home) => {
            let mut path = PathBuf::from(home);
            path.push(".local/share/ketang");
            path
        }
        None => PathBuf::from("data"),
    }
}

pub fn get_database_path() -> PathBuf {
    let mut path = get_app_data_dir();
    path.push("ketang.db");
    path
}

/// 初始化日志输出到标准输出
pub fn init_logging(level: log::LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}
