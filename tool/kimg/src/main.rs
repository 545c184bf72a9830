//
// Copyright 2024, UNSW
//
// SPDX-License-Identifier: BSD-2-Clause
//

use kimg_tool::config::ToolConfig;
use kimg_tool::container::{self, DTB_OFFSET};
use kimg_tool::image::kernel_resize;
use kimg_tool::insn::{encode_branch, relocate_branch_func};
use kimg_tool::io::FileIo;
use kimg_tool::logger::StderrLogger;
use kimg_tool::report::{json_report, write_report};
use kimg_tool::util::parse_u64;
use kimg_tool::{load_kernel, KernelInfo};
use log::LevelFilter;
use std::path::Path;

fn print_usage() {
    println!("usage: kimg [-h] [-v] [--config CONFIG] [--json] COMMAND ...")
}

fn print_help() {
    print_usage();
    println!("\ncommands:");
    println!("  info IMAGE                   print the kernel image header");
    println!("  wrap IMAGE [-o OUTPUT]       add the UNCOMPRESSED_IMG container");
    println!("  unwrap IMAGE [-o OUTPUT]     remove the UNCOMPRESSED_IMG container");
    println!("  resize IMAGE SIZE [-o OUTPUT] set the kernel size header field");
    println!("  entry IMAGE OFFSET           resolve a branch thunk at OFFSET");
    println!("  branch FROM TO               encode a B instruction from FROM to TO");
    println!("\noptions:");
    println!("  -h, --help, show this help message and exit");
    println!("  -v, --verbose, log file accesses and header fields");
    println!("  -o, --output OUTPUT (defaults to rewriting IMAGE)");
    println!("  --config CONFIG (JSON)");
    println!("  --json, print reports as JSON");
}

fn usage_error(msg: &str) -> ! {
    print_usage();
    eprintln!("kimg: error: {msg}");
    std::process::exit(1);
}

struct Args<'a> {
    command: &'a str,
    operands: Vec<&'a str>,
    output: Option<&'a str>,
    config: Option<&'a str>,
    verbose: bool,
    json: bool,
}

impl<'a> Args<'a> {
    pub fn parse(args: &'a [String]) -> Args<'a> {
        let mut output = None;
        let mut config = None;
        let mut verbose = false;
        let mut json = false;
        let mut positional = Vec::new();

        if args.len() <= 1 {
            print_usage();
            std::process::exit(1);
        }

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "-v" | "--verbose" => verbose = true,
                "--json" => json = true,
                "-o" | "--output" => {
                    if i < args.len() - 1 {
                        output = Some(args[i + 1].as_str());
                        i += 1;
                    } else {
                        usage_error("argument -o/--output: expected one argument");
                    }
                }
                "--config" => {
                    if i < args.len() - 1 {
                        config = Some(args[i + 1].as_str());
                        i += 1;
                    } else {
                        usage_error("argument --config: expected one argument");
                    }
                }
                arg => positional.push(arg),
            }

            i += 1;
        }

        if positional.is_empty() {
            usage_error("the following arguments are required: COMMAND");
        }
        let command = positional.remove(0);

        let expected = match command {
            "info" | "wrap" | "unwrap" => 1,
            "resize" | "entry" | "branch" => 2,
            _ => usage_error(&format!("unknown command '{command}'")),
        };
        if positional.len() != expected {
            usage_error(&format!(
                "'{command}' expects {expected} argument(s), got {}",
                positional.len()
            ));
        }

        Args {
            command,
            operands: positional,
            output,
            config,
            verbose,
            json,
        }
    }

    fn number(&self, index: usize) -> Result<u64, String> {
        let s = self.operands[index];
        parse_u64(s).ok_or_else(|| format!("'{s}' is not a number"))
    }

    fn image(&self) -> &'a Path {
        Path::new(self.operands[0])
    }

    fn output(&self) -> &'a Path {
        self.output.map(Path::new).unwrap_or_else(|| self.image())
    }
}

fn print_info(info: &KernelInfo, image_len: u64, json: bool) -> Result<(), String> {
    if json {
        let report = json_report(info).map_err(|e| format!("cannot serialise report: {e}"))?;
        println!("{report}");
    } else {
        write_report(info, image_len, &mut std::io::stdout().lock())
            .map_err(|e| format!("cannot write report: {e}"))?;
    }

    Ok(())
}

fn run(args: &Args, config: &ToolConfig) -> Result<(), String> {
    let io = FileIo::new(config.log.clone());
    let json = args.json || config.json;

    match args.command {
        "info" => {
            let image_len = io.file_size(args.image()).map_err(|e| e.to_string())?;
            let (info, _) = load_kernel(&io, args.image()).map_err(|e| e.to_string())?;
            print_info(&info, image_len, json)
        }
        "wrap" => {
            let (info, kimg) = load_kernel(&io, args.image()).map_err(|e| e.to_string())?;
            if info.is_uncompressed_img() {
                return Err(format!(
                    "'{}' already has an UNCOMPRESSED_IMG header",
                    args.image().display()
                ));
            }
            let img = container::wrap(DTB_OFFSET, &kimg, config.big_endian_container)
                .map_err(|e| e.to_string())?;
            io.write_whole(args.output(), &img, false)
                .map_err(|e| e.to_string())
        }
        "unwrap" => {
            let (info, kimg) = load_kernel(&io, args.image()).map_err(|e| e.to_string())?;
            if !info.is_uncompressed_img() {
                eprintln!(
                    "kimg: warning: '{}' has no UNCOMPRESSED_IMG header",
                    args.image().display()
                );
            }
            io.write_whole(args.output(), &kimg, false)
                .map_err(|e| e.to_string())
        }
        "resize" => {
            let new_size = args.number(1)?;
            let (mut info, mut kimg) =
                load_kernel(&io, args.image()).map_err(|e| e.to_string())?;
            kernel_resize(&mut info, &mut kimg, new_size).map_err(|e| e.to_string())?;

            let img = match info.container {
                Some(c) => container::wrap(c.dtb_offset, &kimg, config.big_endian_container)
                    .map_err(|e| e.to_string())?,
                None => kimg,
            };
            io.write_whole(args.output(), &img, false)
                .map_err(|e| e.to_string())
        }
        "entry" => {
            let offset = args.number(1)?;
            let (img, _) = io
                .read_aligned(args.image(), config.read_align)
                .map_err(|e| e.to_string())?;
            let (_, kimg) = container::split(&img);
            let target = relocate_branch_func(kimg, offset).map_err(|e| e.to_string())?;
            println!("{target:#x}");
            Ok(())
        }
        "branch" => {
            let (from, to) = (args.number(0)?, args.number(1)?);
            match encode_branch(from, to) {
                Some(insn) => {
                    println!("{insn:#010x}");
                    Ok(())
                }
                None => Err(format!("{to:#x} is out of branch range of {from:#x}")),
            }
        }
        _ => unreachable!("internal bug: command '{}' passed argument parsing", args.command),
    }
}

fn main() -> Result<(), String> {
    let env_args: Vec<_> = std::env::args().collect();
    let args = Args::parse(&env_args);

    let mut config = match args.config {
        Some(path) => ToolConfig::from_path(Path::new(path))?,
        None => ToolConfig::default(),
    };
    if args.verbose {
        config.log.enabled = true;
    }

    let level = if config.log.enabled {
        LevelFilter::Debug.max(config.level_filter()?)
    } else {
        config.level_filter()?
    };
    StderrLogger::new(level)
        .init()
        .map_err(|e| format!("cannot install logger: {e}"))?;

    if let Err(e) = run(&args, &config) {
        eprintln!("kimg: error: {e}");
        std::process::exit(1);
    }

    Ok(())
}
