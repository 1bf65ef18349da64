mod integration {
    mod ingestion {

        extern crate prometheus;
        extern crate tempdir;
        extern crate textfile_exporter;

        use self::prometheus::Registry;
        use self::tempdir::TempDir;
        use self::textfile_exporter::exposition::TimeAwareCollector;
        use self::textfile_exporter::exposition::text::write_text;
        use self::textfile_exporter::protocols::prometheus::TextDecoder;
        use self::textfile_exporter::source::{CommandNotifier, Notifier, Scanner,
                                              TextfileSource};
        use self::textfile_exporter::store::Store;
        use self::textfile_exporter::time;
        use std::fs::{self, File};
        use std::io::Write;
        use std::path::{Path, PathBuf};
        use std::sync::{Arc, Mutex};
        use std::time::Duration;

        const HOUR: Duration = Duration::from_secs(3600);

        #[derive(Clone, Default)]
        struct Recorder {
            commands: Arc<Mutex<Vec<String>>>,
            template: String,
        }

        impl Notifier for Recorder {
            fn notify(&self, path: &Path) {
                let cmd = CommandNotifier::new(self.template.as_str()).command_for(path);
                self.commands.lock().unwrap().push(cmd);
            }
        }

        fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            let mut fp = File::create(&path).unwrap();
            fp.write_all(body.as_bytes()).unwrap();
            path
        }

        fn mtime(path: &Path) -> i64 {
            time::system_time_millis(fs::metadata(path).unwrap().modified().unwrap())
        }

        fn scrape(registry: &Registry) -> String {
            String::from_utf8(write_text(&registry.gather(), Vec::new()).unwrap()).unwrap()
        }

        #[test]
        fn test_files_to_scrape() {
            let dir = TempDir::new("ingestion").unwrap();
            let f = write(
                dir.path(),
                "backup.prom",
                "# HELP backup_duration_seconds How long the backup took.\n\
                 # TYPE backup_duration_seconds gauge\n\
                 backup_duration_seconds{job=\"nightly\"} 312.5\n\
                 # TYPE backup_runs_total counter\n\
                 backup_runs_total 41\n\
                 # TYPE backup_size summary\n\
                 backup_size{quantile=\"0.5\"} 10\n\
                 backup_size_sum 20\n\
                 backup_size_count 2\n",
            );
            write(dir.path(), "ignored.txt", "not_scanned 1\n");
            let now = mtime(&f);

            let store = Arc::new(Store::new());
            let source = TextfileSource::new(
                Arc::clone(&store),
                Scanner::new(dir.path(), HOUR),
                TextDecoder,
                Recorder::default(),
                HOUR,
            );
            let report = source.pass(now).unwrap();
            assert_eq!(report.files, 1);
            assert_eq!(report.points, 2);
            assert_eq!(report.unsupported, 3);

            let registry = Registry::new();
            registry
                .register(Box::new(TimeAwareCollector::new(
                    Arc::clone(&store),
                    Duration::from_secs(25 * 3600),
                )))
                .unwrap();
            assert_eq!(
                scrape(&registry),
                format!(
                    "# HELP backup_duration_seconds How long the backup took.\n\
                     # TYPE backup_duration_seconds gauge\n\
                     backup_duration_seconds{{job=\"nightly\"}} 312.5 {now}\n\
                     # TYPE backup_runs_total counter\n\
                     backup_runs_total 41 {now}\n",
                    now = now
                )
            );
        }

        #[test]
        fn test_points_age_out_without_new_pass() {
            let dir = TempDir::new("ingestion").unwrap();
            let f = write(dir.path(), "a.prom", "fresh 1\nold 2 1000\n");
            let now = mtime(&f);
            let store = Arc::new(Store::new());
            let source = TextfileSource::new(
                Arc::clone(&store),
                Scanner::new(dir.path(), HOUR),
                TextDecoder,
                Recorder::default(),
                HOUR,
            );
            source.pass(now).unwrap();

            let names = |at: i64| -> Vec<String> {
                store
                    .snapshot_at(at, HOUR)
                    .into_iter()
                    .map(|p| p.name().to_string())
                    .collect()
            };
            // `old` carried its own timestamp from 1970.
            assert_eq!(names(now), vec!["fresh".to_string()]);
            assert_eq!(names(now + 3_600_000), vec!["fresh".to_string()]);
            assert!(names(now + 3_600_001).is_empty());
        }

        #[test]
        fn test_stale_files_get_the_command() {
            let dir = TempDir::new("ingestion").unwrap();
            let first = write(dir.path(), "first.prom", "first 1\n");
            let stale = write(dir.path(), "stale.prom", "stale 1\n");
            // Ten minutes after both were written, with a five minute
            // threshold.
            let now = mtime(&first).max(mtime(&stale)) + 10 * 60 * 1000;
            let recorder = Recorder {
                commands: Arc::new(Mutex::new(Vec::new())),
                template: "mv {} {}.bak".to_string(),
            };
            let store = Arc::new(Store::new());
            let source = TextfileSource::new(
                Arc::clone(&store),
                Scanner::new(dir.path(), Duration::from_secs(5 * 60)),
                TextDecoder,
                recorder.clone(),
                HOUR,
            );
            let report = source.pass(now).unwrap();
            assert_eq!(report.stale, 2);
            assert!(store.is_empty());
            let commands = recorder.commands.lock().unwrap().clone();
            assert_eq!(
                commands,
                vec![
                    format!("mv {} {}.bak", first.display(), first.display()),
                    format!("mv {} {}.bak", stale.display(), stale.display()),
                ]
            );
        }
    }
}
