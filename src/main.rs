use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use solver_2048::engine::{Board, Move};
use solver_2048::expectimax::{
    evaluate, BranchEval, Expectimax, ExpectimaxParallel, SearchConfig, SearchStats,
};
use solver_2048::tables::Tables;

#[derive(Debug, Parser)]
#[command(name = "solver-2048", about = "Expectimax move selection for 2048")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Play a full game, always taking the suggested move
    Play {
        /// Seed for tile spawns (entropy if omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Stop after this many moves
        #[arg(long)]
        steps: Option<u64>,
        /// Search the four directions on the rayon pool
        #[arg(long)]
        parallel: bool,
        /// Suppress the spinner status line
        #[arg(long)]
        quiet: bool,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Print the evaluation of every direction for one board
    Suggest {
        /// `0x`-prefixed raw encoding, or 16 tile values in row-major order
        board: Board,
        #[command(flatten)]
        search: SearchArgs,
    },
}

#[derive(Debug, Args)]
struct SearchArgs {
    /// Prune chance nodes below this cumulative probability
    #[arg(long, default_value_t = 1e-4)]
    prob_cutoff: f64,
    /// Hard cap on the adaptive search depth
    #[arg(long)]
    depth_cap: Option<u32>,
    /// Disable the transposition table
    #[arg(long)]
    no_cache: bool,
}

impl SearchArgs {
    fn config(&self) -> SearchConfig {
        SearchConfig {
            prob_cutoff: self.prob_cutoff,
            depth_cap: self.depth_cap,
            cache_enabled: !self.no_cache,
            ..Default::default()
        }
    }
}

enum Selector<'t> {
    Sequential(Expectimax<'t>),
    Parallel(ExpectimaxParallel<'t>),
}

impl Selector<'_> {
    fn best_move(&mut self, board: Board) -> Option<Move> {
        match self {
            Selector::Sequential(ex) => ex.best_move(board),
            Selector::Parallel(ex) => ex.best_move(board),
        }
    }

    fn last_stats(&self) -> SearchStats {
        match self {
            Selector::Sequential(ex) => ex.last_stats(),
            Selector::Parallel(ex) => ex.last_stats(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let tables = Tables::new();
    match cli.cmd {
        Cmd::Play { seed, steps, parallel, quiet, search } => {
            play(&tables, seed, steps, parallel, quiet, search.config())
        }
        Cmd::Suggest { board, search } => suggest(&tables, board, search.config()),
    }
}

fn play(
    tables: &Tables,
    seed: Option<u64>,
    steps: Option<u64>,
    parallel: bool,
    quiet: bool,
    cfg: SearchConfig,
) -> anyhow::Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut selector = if parallel {
        Selector::Parallel(ExpectimaxParallel::with_config(tables, cfg))
    } else {
        Selector::Sequential(Expectimax::with_config(tables, cfg))
    };

    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} | Moves: {msg}")
                .context("invalid spinner template")?
                .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let start = Instant::now();
    let mut board = Board::initial(&mut rng);
    let mut move_count: u64 = 0;
    let mut states_considered: u64 = 0;
    while steps.map_or(true, |limit| move_count < limit) {
        let Some(direction) = selector.best_move(board) else { break };
        states_considered += selector.last_stats().moves_evaled;
        board = tables.make_move(direction, board, &mut rng);
        move_count += 1;
        tracing::debug!(turn = move_count, %direction, board = ?board, "played move");
        if move_count % 10 == 0 {
            let score = evaluate(tables, board).score;
            pb.set_message(format!("{move_count} | score: {score}"));
        }
    }
    pb.finish_and_clear();

    let elapsed = start.elapsed().as_secs_f64().max(1e-6);
    let eval = evaluate(tables, board);
    println!("{board}");
    tracing::info!(
        moves = move_count,
        moves_per_sec = move_count as f64 / elapsed,
        states_considered,
        score = eval.score,
        max_rank = board.max_rank(),
        highest_tile = board.highest_tile(),
        game_over = tables.is_game_over(board),
        "game finished"
    );
    Ok(())
}

fn suggest(tables: &Tables, board: Board, cfg: SearchConfig) -> anyhow::Result<()> {
    let mut ex = Expectimax::with_config(tables, cfg);
    let eval = evaluate(tables, board);
    println!("{board}");
    println!("heuristic: {:.1} | score: {}", eval.heuristic, eval.score);

    let (best, branches) = ex.best_move_with_branches(board);
    for BranchEval { dir, ev, legal } in branches {
        if legal {
            println!("{:>5} ({}): {ev:.3}", dir.to_string(), dir.letter());
        } else {
            println!("{:>5} ({}): illegal", dir.to_string(), dir.letter());
        }
    }
    match best {
        Some(dir) => println!("best: {dir}"),
        None => println!("best: none"),
    }
    let stats = ex.last_stats();
    tracing::info!(
        moves_evaled = stats.moves_evaled,
        cache_hits = stats.cache_hits,
        depth_limit = stats.depth_limit,
        "search finished"
    );
    Ok(())
}
