use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::path::PathBuf;

pub struct Config {
    pub name: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    pub logger_stderr: bool,
    /// 启动文件；未设置时使用用户主目录下的 `.ushrc`
    pub rc_file: Option<PathBuf>,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/ush")
        } else {
            env::temp_dir().join("ush")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from(env!("CARGO_PKG_NAME")),
            history_file: config_dir.join(".ush_history"),
            editor_mode: String::from("emacs"),
            logger_level: String::from("warn"),
            logger_dir: config_dir.join("logs"),
            logger_stderr: false,
            rc_file: None,
        }
    }

    pub fn new() -> Self {
        // 优先加载 .env 文件
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        if let Ok(level) = env::var("USH_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Ok(dir) = env::var("USH_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }

        if env::var_os("USH_LOG_STDERR").is_some() {
            config.logger_stderr = true;
        }

        if let Ok(editor) = env::var("USH_EDITOR") {
            config.editor_mode = editor;
        }

        if let Ok(history) = env::var("USH_HISTORY") {
            config.history_file = PathBuf::from(history);
        }

        if let Ok(rc) = env::var("USH_RC") {
            config.rc_file = Some(PathBuf::from(rc));
        }

        // 历史文件目录创建失败时只影响历史记录的保存
        if let Some(parent) = config.history_file.parent() {
            fs::create_dir_all(parent).ok();
        }

        config
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "vi" => EditMode::Vi,
            _ => EditMode::Emacs,
        }
    }
}
