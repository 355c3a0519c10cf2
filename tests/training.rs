use approx::assert_abs_diff_eq;
use rand::{rngs::StdRng, SeedableRng};

use frozen_lake::{
    agent::QLearningAgent,
    config::{AgentParams, EnvParams, TrainingParams},
    environment::{Env, Movement, Pos},
    maps::MapName,
    model::{model_path, SavedModel},
    policy::{EpsilonGreedy, ExplorationStrategy, Greedy},
    rl,
};

fn two_by_two() -> Env {
    Env::new(
        &["SG", "HH"],
        EnvParams {
            slippery: false,
            slippery_prob: 0.3,
            penalty: -0.1,
            hole_penalty: -1.0,
            goal_reward: 1.0,
        },
    )
    .unwrap()
}

fn agent_params() -> AgentParams {
    AgentParams {
        alpha: 0.1,
        gamma: 0.95,
        epsilon: 0.3,
        epsilon_decay: 0.995,
        min_epsilon: 0.01,
        episodes: 500,
    }
}

#[test]
fn right_from_start_reaches_goal_immediately() {
    let env = two_by_two();
    let mut rng = StdRng::seed_from_u64(0);
    for _ in 0..10 {
        let t = env.step(Movement::Right, env.reset(), &mut rng);
        assert_eq!(t.pos, Pos::new(0, 1));
        assert_eq!(t.reward, 1.0);
        assert!(t.done);
    }
}

#[test]
fn learns_to_prefer_goal_over_hole() {
    let env = two_by_two();
    let params = agent_params();
    let mut agent = QLearningAgent::new(&params).unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    let stats = rl::train(
        &env,
        &mut agent,
        params.episodes,
        &TrainingParams::default(),
        &mut rng,
        &mut (),
    );

    let start = env.reset();
    let right = agent.table().get(start, Movement::Right);
    let down = agent.table().get(start, Movement::Down);
    assert!(right > down, "Q(start, Right) = {right}, Q(start, Down) = {down}");
    assert!(right > 0.5);
    assert_eq!(agent.table().greedy_action(start), Movement::Right);
    assert_eq!(stats.rewards.len(), params.episodes);
    assert_abs_diff_eq!(agent.epsilon(), 0.3 * 0.995f64.powi(500), epsilon = 1e-9);
    // terminal cells are never updated
    assert_eq!(agent.table().values(Pos::new(0, 1)), [0.0; 4]);
}

#[test]
fn slippery_lake_training_terminates_and_learns_something() {
    let env = Env::new(MapName::Small.rows(), EnvParams::default()).unwrap();
    let mut agent = QLearningAgent::new(&AgentParams {
        epsilon: 1.0,
        epsilon_decay: 0.99,
        ..AgentParams::default()
    })
    .unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    let stats = rl::train(&env, &mut agent, 2_000, &TrainingParams::default(), &mut rng, &mut ());

    assert_eq!(stats.steps.len(), 2_000);
    assert!(stats.success_rate() > 0.0);
    assert!(agent.table().len() > 1);
    for (pos, _) in agent.table().iter() {
        assert!(!env.is_terminal(*pos));
    }
}

#[test]
fn saved_model_reproduces_action_choices() {
    let env = Env::new(MapName::Small.rows(), EnvParams::default()).unwrap();
    let params = agent_params();
    let mut agent = QLearningAgent::new(&params).unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    rl::train(&env, &mut agent, 300, &TrainingParams::default(), &mut rng, &mut ());

    let dir = tempfile::tempdir().unwrap();
    let path = model_path(dir.path(), "4x4", true);
    SavedModel::from_table(agent.table(), "4x4", true)
        .save_to_file(&path)
        .unwrap();
    let loaded = SavedModel::load_from_file(&path).unwrap().to_table().unwrap();

    assert_eq!(&loaded, agent.table());
    for pos in agent.table().states() {
        assert_eq!(loaded.greedy_action(pos), agent.table().greedy_action(pos));
    }

    // same ε and same draws give the same ε-greedy choices
    let strategy = EpsilonGreedy::new(0.5, 1.0, 0.5);
    let mut a = StdRng::seed_from_u64(11);
    let mut b = StdRng::seed_from_u64(11);
    for pos in agent.table().states() {
        assert_eq!(
            strategy.next_action(&agent.table().values(pos), &mut a),
            strategy.next_action(&loaded.values(pos), &mut b)
        );
    }

    let original = rl::replay(&env, agent.table(), &Greedy, 50, &mut StdRng::seed_from_u64(5));
    let restored = rl::replay(&env, &loaded, &Greedy, 50, &mut StdRng::seed_from_u64(5));
    assert_eq!(original, restored);
}

#[test]
fn resumed_agent_keeps_loaded_table() {
    let env = two_by_two();
    let params = agent_params();
    let mut agent = QLearningAgent::new(&params).unwrap();
    rl::train(&env, &mut agent, 50, &TrainingParams::default(), &mut StdRng::seed_from_u64(1), &mut ());

    let table = agent.table().clone();
    let resumed = QLearningAgent::with_table(&params, table.clone()).unwrap();
    assert_eq!(resumed.table(), &table);
    assert_eq!(resumed.epsilon(), params.epsilon);
}

#[test]
fn training_resumes_from_saved_table() {
    let env = two_by_two();
    let params = agent_params();
    let mut agent = QLearningAgent::new(&params).unwrap();
    rl::train(&env, &mut agent, 200, &TrainingParams::default(), &mut StdRng::seed_from_u64(4), &mut ());

    let dir = tempfile::tempdir().unwrap();
    let path = model_path(dir.path(), "2x2", false);
    SavedModel::from_table(agent.table(), "2x2", false)
        .save_to_file(&path)
        .unwrap();

    let greedy = AgentParams {
        epsilon: 0.0,
        min_epsilon: 0.0,
        ..params
    };
    let mut resumed =
        QLearningAgent::with_table(&greedy, SavedModel::load_table(&path).unwrap()).unwrap();
    let before = resumed.table().get(env.reset(), Movement::Right);
    let stats = rl::train(&env, &mut resumed, 5, &TrainingParams::default(), &mut StdRng::seed_from_u64(8), &mut ());

    // the loaded values already point at the goal, so every episode is one step
    assert_eq!(stats.steps, vec![1; 5]);
    assert!(resumed.table().get(env.reset(), Movement::Right) >= before);
}
