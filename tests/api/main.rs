mod end_to_end;
mod helpers;
mod journal;
mod redis_queue;
