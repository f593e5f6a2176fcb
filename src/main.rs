use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use bag2media::cli::{Cli, Commands, clean_topics};
use bag2media::csv_export::{self, CsvOptions};
use bag2media::extract::{self, ExtractOptions, parse_resize};
use bag2media::split::{self, SplitOptions};
use bag2media::summary::{self, SummaryOptions};
use bag2media::video::{self, VideoOptions};
use bag2media::{bag_io, schema};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect { bag } => bag_io::inspect_bag(&bag),
        Commands::Summary {
            input,
            output,
            file_name,
            split,
            hidden,
        } => {
            let options = SummaryOptions {
                input,
                output,
                file_name,
                split,
                hidden,
            };
            for path in summary::write_summary(&options)? {
                tracing::info!("summary written to {}", path.display());
            }
            Ok(())
        }
        Commands::Images {
            input,
            output,
            format,
            topics,
            naming,
            resize,
            sample,
            start,
            end,
            no_manifest,
            video,
            keep_images,
            write_workers,
            no_progress,
        } => {
            let options = ExtractOptions {
                bag_path: input,
                output_folder: output,
                file_format: format.parse().map_err(anyhow::Error::msg)?,
                topics: clean_topics(topics),
                create_manifest: !no_manifest,
                naming: naming.parse()?,
                resize: resize.as_deref().map(parse_resize).transpose()?,
                sample,
                start_time: start,
                end_time: end,
                show_progress: !no_progress,
                write_workers,
                make_video: video,
                keep_images,
            };
            let folders = extract::extract_images(&options)?;
            tracing::info!("extracted {} topic(s)", folders.len());
            Ok(())
        }
        Commands::Video {
            input,
            resize,
            keep_images,
        } => {
            let options = VideoOptions {
                folder: input,
                keep_images,
                resize,
            };
            if video::make_video(&options)?.is_none() {
                tracing::warn!("no video written for {}", options.folder.display());
            }
            Ok(())
        }
        Commands::Csv { input, output, topics } => {
            let options = CsvOptions {
                input,
                output_dir: output,
                topics: clean_topics(topics),
            };
            let written = csv_export::export_csv(&options)?;
            tracing::info!("wrote {} CSV file(s)", written.len());
            Ok(())
        }
        Commands::Split { input, output, chunks } => {
            let options = SplitOptions {
                input,
                output_dir: output,
                chunks,
            };
            let parts = split::split_rosbag(&options)?;
            tracing::info!("wrote {} part(s)", parts.len());
            Ok(())
        }
        Commands::Schema {} => schema::print_schema(),
    }
}
