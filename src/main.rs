use campus_assistant::cli::{Cli, Commands, ConfigAction};
use campus_assistant::config::Config;
use campus_assistant::error::{CampusError, Result};
use campus_assistant::intent::Intent;
use campus_assistant::retrieval::{Answer, ExcerptCompletion, MatchOutcome, Retriever, TopicMatch};
use serde::Serialize;
use std::path::{Path, PathBuf};

const GREETING_REPLY: &str = "你好！我是校园助手，有什么可以帮你的吗？";
const NO_MATCH_REPLY: &str = "找不到相关信息，请尝试其他查询";

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Match { query, limit, json } => {
            cmd_match(cli.config, &query, limit, json)?;
        }
        Commands::Ask {
            question,
            topic,
            json,
        } => {
            cmd_ask(cli.config, &question, topic.as_deref(), json)?;
        }
        Commands::Topics => {
            cmd_topics(cli.config)?;
        }
        Commands::Show { topic, json } => {
            cmd_show(cli.config, &topic, json)?;
        }
        Commands::Expand { token } => {
            cmd_expand(cli.config, &token)?;
        }
        Commands::Index { json } => {
            cmd_index(cli.config, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "campus_assistant=debug"
    } else {
        "campus_assistant=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_match(config_path: Option<PathBuf>, query: &str, limit: Option<usize>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let retriever = Retriever::from_config(&config)?;

    let outcome = retriever.match_query(query);
    let limit = limit.unwrap_or(config.retrieval.limit);
    let ranked = match outcome {
        MatchOutcome::Matched(_) => retriever.rank(query, limit),
        _ => Vec::new(),
    };

    if json {
        #[derive(Serialize)]
        struct MatchReport<'a> {
            query: &'a str,
            outcome: &'a MatchOutcome,
            ranked: &'a [TopicMatch],
        }
        print_json(&MatchReport {
            query,
            outcome: &outcome,
            ranked: &ranked,
        })?;
        return Ok(());
    }

    match &outcome {
        MatchOutcome::Greeting => println!("Intent: {}", Intent::Greeting),
        MatchOutcome::NoConfidentMatch { intent } => {
            println!("Intent: {}", intent);
            println!("No confident match");
        }
        MatchOutcome::Matched(best) => {
            println!("Intent: {}", Intent::TopicQuery);
            println!("Best:   {} ({})", best.display_name, best.topic_id);
            for (rank, m) in ranked.iter().enumerate() {
                println!(
                    "  {}. {:<16} score={} tokens=[{}]",
                    rank + 1,
                    m.topic_id,
                    m.score,
                    m.matched_tokens.join(", ")
                );
            }
            if let Some(qa) = &best.qa {
                println!("\nQ: {}\nA: {}", qa.question, qa.answer);
            }
        }
    }

    Ok(())
}

fn cmd_ask(
    config_path: Option<PathBuf>,
    question: &str,
    topic: Option<&str>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let retriever = Retriever::from_config(&config)?;
    let completion = ExcerptCompletion::new(config.completion.excerpt_lines);

    let answer = match topic {
        Some(id) => retriever.answer_in_topic(id, question, &completion)?,
        None => retriever.answer(question, &completion)?,
    };

    if json {
        return print_json(&answer);
    }

    match answer {
        Answer::Greeting => println!("{}", GREETING_REPLY),
        Answer::NoMatch { .. } => println!("{}", NO_MATCH_REPLY),
        Answer::Generated { text, .. } => println!("{}", text),
    }

    Ok(())
}

fn cmd_topics(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let retriever = Retriever::from_config(&config)?;

    for (id, summary) in retriever.index().topics() {
        println!("{:<16} {}", id, summary);
    }

    Ok(())
}

fn cmd_show(config_path: Option<PathBuf>, topic: &str, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let retriever = Retriever::from_config(&config)?;
    let document = retriever.index().document(topic)?;

    if json {
        return print_json(document.as_ref());
    }

    println!("# {}", document.title);
    println!("Keywords: {}", document.keywords.join("、"));
    println!("QA pairs: {}", document.qa_pairs.len());
    println!();
    println!("{}", document.body);

    Ok(())
}

fn cmd_expand(config_path: Option<PathBuf>, token: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let retriever = Retriever::from_config(&config)?;

    for spelling in retriever.index().variants().expand(token) {
        println!("{}", spelling);
    }

    Ok(())
}

fn cmd_index(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let retriever = Retriever::from_config(&config)?;

    let stats = retriever.index().rebuild_index();
    let snapshot = retriever.index().snapshot();

    if json {
        return print_json(&snapshot);
    }

    println!(
        "{} topics, {} documents, {} failed, {} tokens, {} entries",
        stats.topics, stats.documents, stats.failed, stats.tokens, stats.entries
    );
    for (token, topics) in &snapshot {
        let topics: Vec<&str> = topics.iter().map(String::as_str).collect();
        println!("  {:<12} -> {}", token, topics.join(", "));
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let content = toml::to_string_pretty(&config)?;
            println!("{}", content);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let config_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&config_dir).map_err(|e| CampusError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", config_dir),
            })?;

            let mut config = Config::default();
            config.topics.catalog_file = Some(config_dir.join("topics.toml"));
            config.phonetic.table_file = Some(config_dir.join("pronunciations.txt"));
            config.intent.rules_file = Some(config_dir.join("intents.toml"));
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());

            write_templates(&config_dir, force)?;

            println!("✓ Template files installed");
            println!("  - topics.toml: Topic catalog");
            println!("  - pronunciations.txt: Same-sound spellings");
            println!("  - intents.toml: Intent rules");
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'campus-assistant config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        return Ok(config);
    }

    Config::load(&path)
}

fn write_templates(config_dir: &Path, force: bool) -> Result<()> {
    let templates = [
        ("topics.toml", include_str!("../config-templates/topics.toml")),
        (
            "pronunciations.txt",
            include_str!("../config-templates/pronunciations.txt"),
        ),
        ("intents.toml", include_str!("../config-templates/intents.toml")),
    ];

    for (name, content) in templates {
        let path = config_dir.join(name);
        if path.exists() && !force {
            continue;
        }
        std::fs::write(&path, content).map_err(|e| CampusError::Io {
            source: e,
            context: format!("Failed to write {}: {:?}", name, path),
        })?;
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CampusError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })?;
    println!("{}", json);
    Ok(())
}
