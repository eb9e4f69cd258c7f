use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use echonet_audit::audit::{self, check_exchange, AuditKind};
use echonet_audit::constants::{ESV_GET, ESV_SETC};
use echonet_audit::util::hex::{parse_hex_lenient, parse_hex_u8};
use echonet_audit::{
    bind_socket, check_transcript, decode_frame_hex, discover_node, init_logger,
    init_logger_with_file, log_info, Config, Node, ObjectCode, SchemaRegistry, UdpTransport,
    ValueGenerator,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "echonet-cli")]
#[command(about = "Conformance audit tool for ECHONET Lite devices")]
struct Cli {
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List nodes, instances and implemented properties
    Discover,
    /// SetC requests with 1 to 255 property units
    OpcFuzz {
        #[arg(long)]
        ip: Option<IpAddr>,
        #[arg(long)]
        instance: Option<ObjectCode>,
    },
    /// Requests for property codes the class does not define
    EpcFuzz {
        #[arg(long)]
        ip: Option<IpAddr>,
        #[arg(long)]
        instance: Option<ObjectCode>,
    },
    /// Read properties of one instance
    Get {
        #[arg(long)]
        ip: IpAddr,
        #[arg(long)]
        instance: ObjectCode,
        #[arg(long, value_delimiter = ',', value_parser = parse_epc, required = true)]
        epc: Vec<u8>,
    },
    /// Write one property of one instance
    Set {
        #[arg(long)]
        ip: IpAddr,
        #[arg(long)]
        instance: ObjectCode,
        #[arg(long, value_parser = parse_epc)]
        epc: u8,
        /// EDT as hex (`:` or `-` separators allowed); generated from the schema when omitted
        #[arg(long)]
        edt: Option<String>,
    },
    /// Decode a frame given as hex
    Decode { hex: String },
}

fn parse_epc(text: &str) -> Result<u8, String> {
    parse_hex_u8(text).map_err(|e| e.to_string())
}

struct Session {
    config: Config,
    registry: SchemaRegistry,
    socket: Arc<tokio::net::UdpSocket>,
    generator: ValueGenerator<StdRng>,
}

impl Session {
    async fn open(config: Config) -> Result<Self> {
        let settings = &config.echonet_lite;
        match &settings.log_file {
            Some(path) => init_logger_with_file(path)
                .with_context(|| format!("opening log file {}", path.display()))?,
            None => init_logger(),
        }

        let registry = SchemaRegistry::from_path(&settings.schema_path)
            .with_context(|| format!("loading schema {}", settings.schema_path.display()))?;
        let socket = bind_socket(settings.bind_addr)
            .await
            .context("binding the ECHONET Lite socket")?;
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Session {
            config,
            registry,
            socket,
            generator: ValueGenerator::new(rng),
        })
    }

    fn targets(&self, only: Option<IpAddr>) -> Vec<IpAddr> {
        match only {
            Some(ip) => vec![ip],
            None => self.config.echonet_lite.ip.clone(),
        }
    }

    fn transport(&self, ip: IpAddr) -> UdpTransport {
        UdpTransport::with_socket(Arc::clone(&self.socket), ip)
    }

    async fn discover(&self, ip: IpAddr) -> Result<Node> {
        discover_node(&self.socket, ip, &self.config.echonet_lite, &self.registry)
            .await
            .with_context(|| format!("discovering {ip}"))
    }

    async fn fuzz(&mut self, kind: AuditKind, only_ip: Option<IpAddr>, only: Option<ObjectCode>) -> Result<()> {
        let timeout = self.config.echonet_lite.receive_timeout();
        for ip in self.targets(only_ip) {
            let node = match self.discover(ip).await {
                Ok(node) => node,
                Err(e) => {
                    log::error!("{e:#}");
                    continue;
                }
            };
            let mut transport = self.transport(ip);

            for instance in &node.instances {
                if only.is_some_and(|code| code != instance.object_code) {
                    continue;
                }
                let transcript = match kind {
                    AuditKind::EpcFuzz => {
                        audit::epc_fuzz(&mut transport, instance, &mut self.generator, timeout).await
                    }
                    _ => audit::opc_fuzz(&mut transport, instance, &mut self.generator, timeout).await,
                };
                let transcript = match transcript {
                    Ok(transcript) => transcript,
                    Err(e) => {
                        log::error!("{ip} {}: {e}", instance.object_code);
                        continue;
                    }
                };

                let report = check_transcript(&node.instances, &transcript);
                println!("{ip} {report}");

                let label = format!("{}_{}_{}", kind.name(), ip, instance.object_code);
                let results = serde_json::json!({
                    "node": ip,
                    "transcript": transcript,
                    "report": report,
                });
                audit::write_results(&self.config.echonet_lite.results_dir, &label, &results)?;
            }
        }
        Ok(())
    }

    async fn exchange(&mut self, ip: IpAddr, code: ObjectCode, service: u8, epcs: &[u8], edt: Option<Vec<u8>>) -> Result<()> {
        let node = self.discover(ip).await?;
        let Some(instance) = node.instance(code) else {
            bail!("{ip} has no instance {code}");
        };
        let mut transport = self.transport(ip);
        let timeout = self.config.echonet_lite.receive_timeout();

        let exchange = audit::exchange(
            &mut transport,
            instance,
            service,
            epcs,
            edt.as_deref(),
            &mut self.generator,
            timeout,
        )
        .await?;

        println!("--> sent\n{}", exchange.sent);
        match &exchange.received {
            Some(reply) => println!("<-- received\n{reply}"),
            None => println!("<-- no response"),
        }
        let check = check_exchange(&node.instances, &exchange);
        for violation in check.flow.all() {
            println!("flow: {violation}");
        }
        for finding in &check.findings {
            println!("value: {finding}");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Decode { hex } = &cli.command {
        init_logger();
        let frame = decode_frame_hex(hex).context("decoding frame")?;
        println!("{frame}");
        return Ok(());
    }

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let mut session = Session::open(config).await?;

    match cli.command {
        Commands::Discover => {
            for ip in session.targets(None) {
                let node = match session.discover(ip).await {
                    Ok(node) => node,
                    Err(e) => {
                        log::error!("{e:#}");
                        continue;
                    }
                };
                println!("Node {}", node.address);
                for instance in &node.instances {
                    println!("  {} {}", instance.object_code, instance.class_name);
                    for property in &instance.properties {
                        let flags: String = [
                            (property.implements_get, 'G'),
                            (property.implements_set, 'S'),
                            (property.implements_inf, 'I'),
                        ]
                        .iter()
                        .map(|&(on, flag)| if on { flag } else { '-' })
                        .collect();
                        println!("    0x{:02X} [{flags}] {}", property.epc, property.name);
                    }
                }
            }
        }
        Commands::OpcFuzz { ip, instance } => {
            session.fuzz(AuditKind::OpcFuzz, ip, instance).await?;
        }
        Commands::EpcFuzz { ip, instance } => {
            session.fuzz(AuditKind::EpcFuzz, ip, instance).await?;
        }
        Commands::Get { ip, instance, epc } => {
            session.exchange(ip, instance, ESV_GET, &epc, None).await?;
        }
        Commands::Set {
            ip,
            instance,
            epc,
            edt,
        } => {
            let edt = edt
                .map(|text| parse_hex_lenient(&text))
                .transpose()
                .context("parsing --edt")?;
            session.exchange(ip, instance, ESV_SETC, &[epc], edt).await?;
        }
        Commands::Decode { .. } => {}
    }

    log_info("done");
    Ok(())
}
