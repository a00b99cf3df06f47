//! End-to-end runs of the generate pipeline against temporary directories.

use kodi_fav_gen::config::Config;
use kodi_fav_gen::generate::{GenerateError, generate};
use kodi_fav_gen::render::{self, RenderError};
use kodi_fav_gen::source::ItemError;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Site {
    tmp: TempDir,
}

impl Site {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        for dir in ["favs", "thumbs", "out"] {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        Self { tmp }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.tmp.path().join(relative)
    }

    fn write(&self, relative: &str, content: impl AsRef<[u8]>) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn config(&self) -> Config {
        Config::new([("HOME", "/nonexistent"), ("TMPDIR", "/nonexistent")])
            .with_value("path", self.path("favs"))
            .with_value("output", self.path("out/favourites.xml"))
            .with_value("cache_path", self.path("cache"))
    }

    fn output(&self) -> String {
        fs::read_to_string(self.path("out/favourites.xml")).unwrap()
    }
}

fn cached_files(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

// =========================================================================
// Scenarios
// =========================================================================

#[test]
fn single_movies_declaration() {
    let site = Site::new();
    site.write(
        "favs/movies.yml",
        "name: Movies\naction: ActivateWindow(Videos,videodb://movies/titles/)\nhidden: false\n",
    );

    let report = generate(&site.config()).unwrap();
    assert_eq!(report.rendered.len(), 1);
    assert!(!report.rendered[0].has_thumb);

    let xml = site.output();
    render::validate(&xml).unwrap();
    assert_eq!(xml.matches("<favourite ").count(), 1);
    assert!(xml.contains(r#"name="Movies""#));
    assert!(xml.contains(">ActivateWindow(Videos,videodb://movies/titles/)</favourite>"));
    assert!(!xml.contains("thumb="));
}

#[test]
fn youtube_channel_with_path_option() {
    let site = Site::new();
    site.write(
        "favs/channel.yml",
        "name: Channel\naction:\n  type: youtube_channel\n  value: UCabc\n  _path: /videos/\n",
    );

    generate(&site.config()).unwrap();
    assert!(site.output().contains(
        "ActivateWindow(10025,&quot;plugin://plugin.video.youtube/channel/UCabc/videos/&quot;,return)"
    ));
}

#[test]
fn missing_thumbnail_drops_item_and_reports() {
    let site = Site::new();
    site.write("favs/a.yml", "name: A\naction: x\nthumb: nothing-here\n");
    site.write("favs/b.yml", "name: B\naction: y\n");

    let Err(GenerateError::Incomplete { report }) = generate(&site.config()) else {
        panic!("expected an incomplete run");
    };
    let failures = report.errors.get("a").unwrap();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], ItemError::MissingFile(_)));

    let xml = site.output();
    assert!(xml.contains(r#"id="b""#));
    assert!(!xml.contains(r#"id="a""#));
}

// =========================================================================
// Batches
// =========================================================================

#[test]
fn valid_and_invalid_files_partition() {
    let site = Site::new();
    site.write("favs/030-c.yml", "name: C\naction: z\n");
    site.write("favs/010-a.yml", "name: A\naction: x\n");
    site.write("favs/020-bad.yml", "name: [unclosed\n");
    site.write("favs/040-unknown.yml", "name: U\naction:\n  type: teleport\n  value: x\n");
    site.write("favs/050-b.yml", "name: B\naction: y\n");

    let Err(GenerateError::Incomplete { report }) = generate(&site.config()) else {
        panic!("expected an incomplete run");
    };
    let ids: Vec<&str> = report.rendered.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["010-a", "030-c", "050-b"]);
    assert_eq!(
        report.errors.ids().collect::<Vec<_>>(),
        vec!["020-bad", "040-unknown"]
    );

    let xml = site.output();
    let a = xml.find(r#"id="010-a""#).unwrap();
    let c = xml.find(r#"id="030-c""#).unwrap();
    let b = xml.find(r#"id="050-b""#).unwrap();
    assert!(a < c && c < b);
}

#[test]
fn thumbnails_are_cached_once() {
    let site = Site::new();
    site.write("thumbs/poster.png", b"same bytes");
    site.write("favs/a.yml", "name: A\naction: x\nthumb: poster\n");
    site.write("favs/b.yml", "name: B\naction: y\nthumb: poster\n");

    let report = generate(&site.config()).unwrap();
    assert_eq!(report.cache.writes, 1);
    assert_eq!(report.cache.hits, 1);
    assert_eq!(cached_files(&site.path("cache")), 1);

    let xml = site.output();
    let cache = site.path("cache");
    let cache = cache.to_string_lossy();
    assert_eq!(xml.matches(&format!("thumb=\"{cache}/")).count(), 2);
}

#[test]
fn templated_declaration_reads_variables() {
    let site = Site::new();
    site.write(
        "favs/concerts.yml.tmpl",
        "name: Concerts\naction: PlayMedia({{ media }}/concerts/)\n",
    );
    let config = site.config().with_args(["var_media=/mnt/media"]);

    generate(&config).unwrap();
    assert!(site.output().contains(">PlayMedia(/mnt/media/concerts/)</favourite>"));
}

#[test]
fn settings_file_layer_below_tokens() {
    let site = Site::new();
    site.write("favs/a.yml.tmpl", "name: '{{ label }}'\naction: x\n");
    site.write("settings.toml", "var_label = \"From settings\"\n");

    let config = site
        .config()
        .with_settings_file(&site.path("settings.toml"))
        .unwrap();
    generate(&config).unwrap();
    assert!(site.output().contains(r#"name="From settings""#));

    let config = config.with_args(["var_label=From tokens"]);
    generate(&config).unwrap();
    assert!(site.output().contains(r#"name="From tokens""#));
}

// =========================================================================
// Ordering, characters, variables, thumbnail patterns
// =========================================================================

#[test]
fn document_order_follows_file_names() {
    let site = Site::new();
    site.write("favs/a.yml", "name: A\naction: x\n");
    site.write("favs/a-b.yml", "name: AB\naction: y\n");

    let report = generate(&site.config()).unwrap();
    let ids: Vec<&str> = report.rendered.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a-b", "a"]);

    let xml = site.output();
    assert!(xml.find(r#"id="a-b""#).unwrap() < xml.find(r#"id="a""#).unwrap());
}

#[test]
fn control_character_aborts_before_writing() {
    let site = Site::new();
    site.write("favs/a.yml", "name: \"A\\x01B\"\naction: x\n");

    let result = generate(&site.config());
    assert!(matches!(
        result,
        Err(GenerateError::Render(RenderError::MalformedOutput { .. }))
    ));
    assert!(!site.path("out/favourites.xml").exists());
}

#[test]
fn variables_reach_templates_verbatim() {
    let site = Site::new();
    site.write("favs/a.yml.tmpl", "name: 'Season {{ season }}'\naction: x\n");
    let config = site.config().with_args(["var_season=1.10"]);

    generate(&config).unwrap();
    assert!(site.output().contains(r#"name="Season 1.10""#));
}

#[test]
fn wildcard_thumb_pattern() {
    let site = Site::new();
    site.write("thumbs/poster.png", b"poster");
    site.write("favs/a.yml", "name: A\naction: x\nthumb: 'post*'\n");

    let report = generate(&site.config()).unwrap();
    assert!(report.rendered[0].has_thumb);
    assert_eq!(report.cache.writes, 1);
}
