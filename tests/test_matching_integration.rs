//! End-to-end matching over topic documents stored on disk

use campus_assistant::config::Config;
use campus_assistant::index::{DirectorySource, TopicIndex};
use campus_assistant::intent::{Intent, IntentClassifier};
use campus_assistant::phonetic::PhoneticVariantMap;
use campus_assistant::retrieval::{Answer, ExcerptCompletion, MatchOutcome, Retriever};
use campus_assistant::topics::TopicDefinition;
use campus_assistant::CampusError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const LIBRARY_DOC: &str = "# 图书馆\n\n**关键词**: library、延期\n\n借阅期限 30 天，可延期一次。\n";
const DINING_DOC: &str = "# 餐饮\n\n**关键词**：食堂，餐厅\n\n一食堂 7:00 开门。\n";

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Library and dining topics in a temp directory, plus a config pointing at them
fn campus_fixture() -> (TempDir, Config) {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("topics");
    std::fs::create_dir_all(&docs).unwrap();

    write(&docs, "library.md", LIBRARY_DOC);
    write(&docs, "dining.md", DINING_DOC);

    let catalog = write(
        temp.path(),
        "topics.toml",
        r#"
[[topic]]
id = "library"
display_name = "图书馆"
document = "library.md"

[[topic]]
id = "dining"
display_name = "餐饮"
document = "dining.md"
"#,
    );
    let table = write(temp.path(), "pronunciations.txt", "延期: 延迟\n");

    let mut config = Config::default();
    config.topics.data_dir = docs;
    config.topics.catalog_file = Some(catalog);
    config.phonetic.table_file = Some(table);

    let path = temp.path().join("config.toml");
    config.save(&path).unwrap();
    let config = Config::load(&path).unwrap();

    (temp, config)
}

fn shipped_config() -> Config {
    let mut config = Config::default();
    config.topics.data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/topics");
    config
}

#[test]
fn test_same_sound_spelling_routes_to_library() {
    let (_temp, config) = campus_fixture();
    let retriever = Retriever::from_config(&config).unwrap();

    let outcome = retriever.match_query("图书馆延迟还书");

    let topic = outcome.topic().expect("library should match");
    assert_eq!(topic.topic_id, "library");
    assert!(topic.score >= 1);
    assert_eq!(retriever.classify("图书馆延迟还书"), Intent::TopicQuery);
}

#[test]
fn test_index_contains_document_keywords_and_variants() {
    let (_temp, config) = campus_fixture();
    let retriever = Retriever::from_config(&config).unwrap();

    let stats = retriever.index().rebuild_index();
    assert_eq!(stats.topics, 2);
    assert_eq!(stats.documents, 2);
    assert_eq!(stats.failed, 0);

    let snapshot = retriever.index().snapshot();
    for token in ["library", "延期", "延迟"] {
        assert!(snapshot[token].contains("library"), "missing {}", token);
    }
    for token in ["食堂", "餐厅"] {
        assert!(snapshot[token].contains("dining"), "missing {}", token);
    }
}

#[test]
fn test_unrelated_and_greeting_queries() {
    let (_temp, config) = campus_fixture();
    let retriever = Retriever::from_config(&config).unwrap();

    assert_eq!(
        retriever.match_query("明天会下雨吗"),
        MatchOutcome::NoConfidentMatch {
            intent: Intent::Unknown
        }
    );
    assert_eq!(retriever.match_query("Hello there"), MatchOutcome::Greeting);
}

#[test]
fn test_edited_document_is_picked_up_after_reload() {
    let (temp, config) = campus_fixture();
    let retriever = Retriever::from_config(&config).unwrap();

    assert!(retriever.match_query("夜宵").topic().is_none());

    write(
        &temp.path().join("topics"),
        "dining.md",
        "# 餐饮\n\n**关键词**: 食堂、夜宵\n\n夜宵窗口 22:00 关闭。\n",
    );

    // Cached until reloaded
    assert!(retriever.match_query("夜宵").topic().is_none());

    retriever.index().reload("dining").unwrap();
    let topic = retriever.match_query("夜宵").topic().cloned().unwrap();
    assert_eq!(topic.topic_id, "dining");
}

#[test]
fn test_broken_documents_do_not_block_other_topics() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "dining.md", DINING_DOC);
    write(temp.path(), "policies.md", "没有标题的文档\n只有正文");

    let index = TopicIndex::new(
        Arc::new(DirectorySource::new(temp.path())),
        PhoneticVariantMap::empty(16),
    );
    index
        .register(TopicDefinition::new("dining", "餐饮", &[], "dining.md", ""))
        .unwrap();
    index
        .register(TopicDefinition::new("policies", "校园政策", &["申诉"], "policies.md", ""))
        .unwrap();
    index
        .register(TopicDefinition::new("contacts", "联系方式", &["电话"], "contacts.md", ""))
        .unwrap();

    let stats = index.rebuild_index();
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.failed, 2);

    assert!(matches!(
        index.document("policies"),
        Err(CampusError::MalformedDocument { .. })
    ));
    assert!(matches!(
        index.document("contacts"),
        Err(CampusError::DocumentUnavailable { .. })
    ));

    let retriever = Retriever::new(
        Arc::new(index),
        IntentClassifier::builtin().unwrap(),
        &Config::default().retrieval,
    );

    assert_eq!(
        retriever.match_query("食堂在哪").topic().unwrap().topic_id,
        "dining"
    );
    // Canonical keywords still route, but there is no body to answer from
    assert_eq!(
        retriever.match_query("怎么申诉").topic().unwrap().topic_id,
        "policies"
    );
    assert_eq!(
        retriever
            .answer("怎么申诉", &ExcerptCompletion::default())
            .unwrap(),
        Answer::NoMatch {
            intent: Intent::TopicQuery
        }
    );
}

#[test]
fn test_shipped_topics_route_misspellings() {
    let retriever = Retriever::from_config(&shipped_config()).unwrap();

    let cases = [
        ("效车几点发车", "transportation"),
        ("图书管开到几点", "academic"),
        ("清蒸食堂在哪", "dining"),
        ("什么时候可以退选", "courses"),
    ];

    for (query, expected) in cases {
        let outcome = retriever.match_query(query);
        assert_eq!(
            outcome.topic().map(|t| t.topic_id.as_str()),
            Some(expected),
            "query {:?}",
            query
        );
    }
}

#[test]
fn test_shipped_topics_parse_cleanly() {
    let retriever = Retriever::from_config(&shipped_config()).unwrap();

    let stats = retriever.index().rebuild_index();
    assert_eq!(stats.topics, 10);
    assert_eq!(stats.documents, 10);
    assert_eq!(stats.failed, 0);

    let dining = retriever.index().document("dining").unwrap();
    assert_eq!(dining.title, "餐饮选项");
    assert!(dining.keywords.contains(&"清真食堂".to_string()));
    assert!(!dining.qa_pairs.is_empty());
}

#[test]
fn test_offline_answer_quotes_matched_document() {
    let retriever = Retriever::from_config(&shipped_config()).unwrap();

    match retriever
        .answer("食堂几点开门", &ExcerptCompletion::new(3))
        .unwrap()
    {
        Answer::Generated { topic, text } => {
            assert_eq!(topic.topic_id, "dining");
            assert!(text.starts_with("餐饮选项\n\n"));
            assert!(text.contains("一食堂"));
        }
        other => panic!("unexpected answer {:?}", other),
    }
}

#[test]
fn test_long_and_mixed_script_keywords_match() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "it.md",
        "# 信息化服务\n\n**关键词**: VPN账号、Web of Science、研究生院教务办公室\n\n账号问题请联系网络中心。\n",
    );
    write(temp.path(), "dining.md", DINING_DOC);

    let index = TopicIndex::new(
        Arc::new(DirectorySource::new(temp.path())),
        PhoneticVariantMap::builtin(64),
    );
    index
        .register(TopicDefinition::new("it", "信息化服务", &[], "it.md", ""))
        .unwrap();
    index
        .register(TopicDefinition::new("dining", "餐饮", &[], "dining.md", ""))
        .unwrap();
    let retriever = Retriever::new(
        Arc::new(index),
        IntentClassifier::builtin().unwrap(),
        &Config::default().retrieval,
    );

    for query in ["研究生院教务办公室", "VPN账号", "Web of Science", "食堂"] {
        let expected = if query == "食堂" { "dining" } else { "it" };
        assert_eq!(
            retriever.match_query(query).topic().map(|t| t.topic_id.as_str()),
            Some(expected),
            "query {:?}",
            query
        );
    }
}

#[test]
fn test_ask_within_chosen_topic() {
    let retriever = Retriever::from_config(&shipped_config()).unwrap();

    // No transportation keyword in the question, the chosen topic still answers
    match retriever
        .answer_in_topic("transportation", "几点开始运营", &ExcerptCompletion::new(2))
        .unwrap()
    {
        Answer::Generated { topic, text } => {
            assert_eq!(topic.topic_id, "transportation");
            assert!(text.starts_with("周边交通\n\n"));
        }
        other => panic!("unexpected answer {:?}", other),
    }

    assert!(matches!(
        retriever.answer_in_topic("gym", "几点开门", &ExcerptCompletion::default()),
        Err(CampusError::TopicNotFound { .. })
    ));
}
