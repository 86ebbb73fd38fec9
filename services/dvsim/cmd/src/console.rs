//! Line-oriented control console.
//!
//! Reads one command per line, drives the [`Simulation`], and writes
//! human-readable output. Malformed input is reported and never ends the
//! loop; `exit` or end of input shuts the simulation down.

use dv_node::{ConvergenceReport, NodeSnapshot, Simulation};
use dv_routing::INFINITY;
use dv_topology::{Cost, NodeId};
use std::fmt::Write as _;
use std::str::FromStr;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Help text printed for unknown input
pub const HELP: &str = "\
List of supported commands:
show\t:\tprint cost vectors at the moment
routes\t:\tprint next-hop vectors at the moment
check\t:\tcompare cost vectors with the true shortest paths
stats\t:\tprint per-node message and route counters
update\t:\tupdate edge len. Format: update a b len
exit\t:\tsafe exit program
";

const UPDATE_USAGE: &str = "usage: update <nodeA> <nodeB> <cost>";

/// A parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print every node's cost vector
    Show,
    /// Print every node's next-hop vector
    Routes,
    /// Compare the tables with the reference shortest paths
    Check,
    /// Print every node's counters
    Stats,
    /// Set the direct link cost between two nodes
    Update {
        /// First endpoint
        a: NodeId,
        /// Second endpoint
        b: NodeId,
        /// New cost
        cost: Cost,
    },
    /// Shut down and leave
    Exit,
}

/// Console input errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Blank line
    #[error("empty command")]
    Empty,

    /// First word is not a known command
    #[error("unknown command '{0}'")]
    Unknown(String),

    /// `update` with the wrong number of arguments
    #[error("update takes exactly 3 arguments, got {0}")]
    UpdateArity(usize),

    /// Argument that is not a valid number
    #[error("invalid {field} '{value}': expected a non-negative integer")]
    InvalidNumber {
        /// Which argument
        field: &'static str,
        /// What was typed
        value: String,
    },
}

fn parse_arg<T: FromStr>(field: &'static str, value: &str) -> Result<T, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(CommandError::Empty);
        };

        match name {
            "show" => Ok(Command::Show),
            "routes" => Ok(Command::Routes),
            "check" => Ok(Command::Check),
            "stats" => Ok(Command::Stats),
            "exit" => Ok(Command::Exit),
            "update" => {
                let args: Vec<&str> = words.collect();
                let [a, b, cost] = args.as_slice() else {
                    return Err(CommandError::UpdateArity(args.len()));
                };
                Ok(Command::Update {
                    a: parse_arg("nodeA", a)?,
                    b: parse_arg("nodeB", b)?,
                    cost: parse_arg("cost", cost)?,
                })
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn format_cost(cost: Cost) -> String {
    if cost == INFINITY {
        "inf".to_string()
    } else {
        cost.to_string()
    }
}

/// `Node <id>: [c0 c1 ...]` for every node
pub fn render_costs(snapshots: &[NodeSnapshot]) -> String {
    let mut out = String::from("\nCost vectors (by far):\n");
    for snapshot in snapshots {
        let costs: Vec<String> = snapshot
            .table
            .costs()
            .iter()
            .map(|&c| format_cost(c))
            .collect();
        let _ = writeln!(out, "Node {}: [{}]", snapshot.id, costs.join(" "));
    }
    out.push('\n');
    out
}

/// `Node <id>: [h0 h1 ...]` for every node, `-` for unreachable
pub fn render_routes(snapshots: &[NodeSnapshot]) -> String {
    let mut out = String::from("\nNext hops (by far):\n");
    for snapshot in snapshots {
        let hops: Vec<String> = snapshot
            .table
            .next_hops()
            .iter()
            .map(|hop| hop.map_or_else(|| "-".to_string(), |h| h.to_string()))
            .collect();
        let _ = writeln!(out, "Node {}: [{}]", snapshot.id, hops.join(" "));
    }
    out.push('\n');
    out
}

/// Every node's counters as an indented YAML block
pub fn render_stats(snapshots: &[NodeSnapshot]) -> Result<String, serde_yaml::Error> {
    let mut out = String::from("\nCounters (by far):\n");
    for snapshot in snapshots {
        let yaml = serde_yaml::to_string(&snapshot.stats)?;
        let _ = writeln!(out, "Node {}:", snapshot.id);
        for line in yaml.lines() {
            let _ = writeln!(out, "  {}", line);
        }
    }
    out.push('\n');
    Ok(out)
}

/// Summary of a convergence check
pub fn render_report(report: &ConvergenceReport) -> String {
    if report.is_converged() {
        return "converged\n".to_string();
    }

    let mut out = String::from("not converged:\n");
    for mismatch in &report.mismatches {
        let _ = writeln!(
            out,
            "  node {} -> {}: expected {}, have {}",
            mismatch.node,
            mismatch.destination,
            format_cost(mismatch.expected),
            format_cost(mismatch.actual)
        );
    }
    for broken in &report.broken_routes {
        let _ = writeln!(out, "  {}", broken);
    }
    out
}

/// Whether the loop should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Interactive console over any line source and sink
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a console
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Give back the output sink
    pub fn into_output(self) -> W {
        self.output
    }

    /// Read and execute commands until `exit` or end of input. The
    /// simulation is shut down before returning.
    pub async fn run(&mut self, sim: &mut Simulation) -> std::io::Result<()> {
        let mut line = String::new();

        loop {
            line.clear();
            if self.input.read_line(&mut line).await? == 0 {
                info!(component = "console", "End of input, shutting down");
                sim.shutdown().await;
                break;
            }

            let flow = match line.parse::<Command>() {
                Ok(command) => {
                    debug!(component = "console", "Console command: {:?}", command);
                    self.execute(command, sim).await?
                }
                Err(CommandError::Empty) => Flow::Continue,
                Err(CommandError::Unknown(_)) => {
                    self.write(&format!("\n{}\n", HELP)).await?;
                    Flow::Continue
                }
                Err(e) => {
                    self.write(&format!("error: {}\n{}\n", e, UPDATE_USAGE)).await?;
                    Flow::Continue
                }
            };

            if flow == Flow::Exit {
                break;
            }
        }

        self.output.flush().await
    }

    async fn execute(
        &mut self,
        command: Command,
        sim: &mut Simulation,
    ) -> std::io::Result<Flow> {
        match command {
            Command::Show => {
                self.write(&render_costs(&sim.snapshots())).await?;
            }
            Command::Routes => {
                self.write(&render_routes(&sim.snapshots())).await?;
            }
            Command::Check => {
                self.write(&render_report(&sim.convergence_report())).await?;
            }
            Command::Stats => match render_stats(&sim.snapshots()) {
                Ok(text) => self.write(&text).await?,
                Err(e) => self.write(&format!("error: {}\n", e)).await?,
            },
            Command::Update { a, b, cost } => match sim.update_link(a, b, cost).await {
                Ok(previous) => {
                    let was = previous.map_or_else(|| "no link".to_string(), |c| c.to_string());
                    self.write(&format!("link {}<->{} set to {} (was {})\n", a, b, cost, was))
                        .await?;
                }
                Err(e) => {
                    self.write(&format!("error: {}\n", e)).await?;
                }
            },
            Command::Exit => {
                info!(component = "console", "Exit requested, shutting down");
                sim.shutdown().await;
                return Ok(Flow::Exit);
            }
        }

        Ok(Flow::Continue)
    }

    async fn write(&mut self, text: &str) -> std::io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dv_node::NodeConfig;
    use dv_topology::Topology;
    use std::time::Duration;
    use tokio::io::BufReader;

    #[test]
    fn test_parse_commands() {
        assert_eq!("show".parse(), Ok(Command::Show));
        assert_eq!("  routes  \n".parse(), Ok(Command::Routes));
        assert_eq!("check".parse(), Ok(Command::Check));
        assert_eq!("stats".parse(), Ok(Command::Stats));
        assert_eq!("exit\n".parse(), Ok(Command::Exit));
        assert_eq!(
            "update 1 3 1".parse(),
            Ok(Command::Update { a: 1, b: 3, cost: 1 })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!("   \n".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!(
            "hello world".parse::<Command>(),
            Err(CommandError::Unknown("hello".to_string()))
        );
        assert_eq!("update".parse::<Command>(), Err(CommandError::UpdateArity(0)));
        assert_eq!("update 1 2".parse::<Command>(), Err(CommandError::UpdateArity(2)));
        assert_eq!("update 1 2 3 4".parse::<Command>(), Err(CommandError::UpdateArity(4)));
        assert_eq!(
            "update 1 x 3".parse::<Command>(),
            Err(CommandError::InvalidNumber {
                field: "nodeB",
                value: "x".to_string()
            })
        );
        assert_eq!(
            "update 1 2 -5".parse::<Command>(),
            Err(CommandError::InvalidNumber {
                field: "cost",
                value: "-5".to_string()
            })
        );
    }

    #[test]
    fn test_render_report() {
        assert_eq!(render_report(&ConvergenceReport::default()), "converged\n");

        let report = ConvergenceReport {
            mismatches: vec![dv_node::CostMismatch {
                node: 0,
                destination: 3,
                expected: 4,
                actual: INFINITY,
            }],
            broken_routes: Vec::new(),
        };
        assert_eq!(
            render_report(&report),
            "not converged:\n  node 0 -> 3: expected 4, have inf\n"
        );
    }

    fn test_config() -> NodeConfig {
        NodeConfig {
            broadcast_interval: Duration::from_millis(200),
            ..NodeConfig::default()
        }
    }

    async fn run_script(script: &str, sim: &mut Simulation) -> String {
        let mut console = Console::new(BufReader::new(script.as_bytes()), Vec::new());
        console.run(sim).await.unwrap();
        String::from_utf8(console.into_output()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_console_session() {
        let mut sim = Simulation::start(Topology::sample(), test_config()).unwrap();
        sim.wait_for_convergence(Duration::from_secs(60), Duration::from_millis(100))
            .await;

        let output = run_script(
            "show\nroutes\ncheck\nstats\n\n\
             update 1 x 1\nupdate 0 0 4\nupdate 1 3 1\nbogus\nexit\nshow\n",
            &mut sim,
        )
        .await;

        assert!(output.contains("Node 0: [0 1 2 4]"));
        assert!(output.contains("Node 1: [1 0 1 3]"));
        assert!(output.contains("\nconverged\n"));
        assert!(output.contains("Node 3:\n  relax:\n    advertisements_applied: "));
        assert!(output.contains("  heartbeats_sent: "));
        assert!(output.contains("error: invalid nodeB 'x'"));
        assert!(output.contains("error: node 0 cannot link to itself"));
        assert!(output.contains("link 1<->3 set to 1 (was no link)"));
        assert!(output.contains("List of supported commands:"));
        assert!(sim.is_stopped());
        assert_eq!(sim.topology().link_cost(1, 3), Some(1));

        // Nothing after exit is executed
        assert_eq!(output.matches("Cost vectors").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_of_input_shuts_down() {
        let mut sim = Simulation::start(Topology::sample(), test_config()).unwrap();
        let output = run_script("show\n", &mut sim).await;

        assert!(output.contains("Cost vectors"));
        assert!(sim.is_stopped());
    }
}
